//! HTTP Method and method bitmask.
use std::{fmt, ops::BitOr, str::FromStr};

macro_rules! methods {
    ($($(#[$doc:meta])* $name:ident: $variant:ident = $bit:literal, $val:literal;)*) => {
        /// HTTP Method.
        ///
        /// Each known method maps to a single bit so that a set of accepted
        /// methods can be expressed as a [`Methods`] mask.
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub enum Method {
            /// A syntactically valid token the server does not recognize.
            ///
            /// Carries no bit, so it never intersects a route's method mask.
            #[default]
            Unknown,
            $($variant,)*
        }

        impl Method {
            /// Create [`Method`] from bytes, yielding [`Method::Unknown`]
            /// for any unrecognized token.
            pub const fn from_bytes(src: &[u8]) -> Method {
                match src {
                    $($val => Method::$variant,)*
                    _ => Method::Unknown,
                }
            }

            /// Returns string representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    Method::Unknown => "UNKNOWN",
                    $(Method::$variant => stringify!($name),)*
                }
            }

            /// Returns the method's bit within a [`Methods`] mask.
            pub const fn bit(&self) -> u16 {
                match self {
                    Method::Unknown => 0,
                    $(Method::$variant => $bit,)*
                }
            }
        }

        impl Methods {
            $(
                $(#[$doc])*
                pub const $name: Methods = Methods($bit);
            )*

            /// Every known method.
            pub const ALL: Methods = Methods($($bit)|*);
        }

        impl FromStr for Methods {
            type Err = UnknownMethod;

            /// Parse a pipe-joined method list, e.g. `"GET|POST"`.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut mask = Methods::empty();
                for part in s.split('|') {
                    match part.trim().as_bytes() {
                        $($val => mask.0 |= $bit,)*
                        _ => return Err(UnknownMethod),
                    }
                }
                Ok(mask)
            }
        }
    };
}

methods! {
    /// The `GET` method requests a representation of the specified resource.
    GET: Get = 0x0001, b"GET";
    /// The `PUT` method replaces the target resource with the request content.
    PUT: Put = 0x0002, b"PUT";
    /// The `DELETE` method deletes the specified resource.
    DELETE: Delete = 0x0004, b"DELETE";
    /// The `POST` method submits an entity to the specified resource.
    POST: Post = 0x0008, b"POST";
    /// The `HEAD` method asks for a GET response without the response body.
    HEAD: Head = 0x0010, b"HEAD";
    /// The `OPTIONS` method describes the communication options for the target.
    OPTIONS: Options = 0x0020, b"OPTIONS";
    /// The `PATCH` method applies partial modifications to a resource.
    PATCH: Patch = 0x0040, b"PATCH";
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Methods =====

/// Bitmask over [`Method`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Methods(u16);

impl Methods {
    /// Mask matching nothing.
    ///
    /// A zero mask is deliberately inert rather than a wildcard: a route
    /// registered with it can never match. Use [`Methods::ALL`] to accept
    /// every method.
    pub const fn empty() -> Methods {
        Methods(0)
    }

    /// Returns `true` if the mask accepts `method`.
    ///
    /// [`Method::Unknown`] carries no bit and is contained in no mask.
    pub const fn contains(&self, method: Method) -> bool {
        let bit = method.bit();
        bit != 0 && self.0 & bit != 0
    }

    /// Returns `true` if no method bit is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Methods {
    type Output = Methods;

    fn bitor(self, rhs: Methods) -> Methods {
        Methods(self.0 | rhs.0)
    }
}

impl From<Method> for Methods {
    fn from(method: Method) -> Methods {
        Methods(method.bit())
    }
}

impl fmt::Debug for Methods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for method in [
            Method::Get,
            Method::Put,
            Method::Delete,
            Method::Post,
            Method::Head,
            Method::Options,
            Method::Patch,
        ] {
            if self.contains(method) {
                list.entry(&method.as_str());
            }
        }
        list.finish()
    }
}

// ===== Error =====

/// An error when trying to parse [`Methods`] from a string.
#[derive(Debug)]
pub struct UnknownMethod;

impl std::error::Error for UnknownMethod {}

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown method")
    }
}
