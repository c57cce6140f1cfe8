use std::num::NonZeroU16;

/// HTTP [Status Code][rfc].
///
/// Only the codes the responder honors are constructible.
///
/// [rfc]: <https://datatracker.ietf.org/doc/html/rfc9110#name-status-codes>
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(NonZeroU16);

impl Default for StatusCode {
    #[inline]
    fn default() -> Self {
        Self::OK
    }
}

macro_rules! status_code {
    (
        $(
            $(#[$doc:meta])*
            $int:literal $id:ident $msg:literal;
        )*
    ) => {
        impl StatusCode {
            /// Returns status code value, e.g: `200`.
            #[inline]
            pub const fn status(&self) -> u16 {
                self.0.get()
            }

            /// Returns status code and reason phrase as string slice, e.g: `"200 OK"`.
            #[inline]
            pub const fn as_str(&self) -> &'static str {
                match self.0.get() {
                    $(
                        $int => concat!(stringify!($int), " ", $msg),
                    )*
                    // SAFETY: StatusCode value is privately constructed and immutable
                    _ => unsafe { std::hint::unreachable_unchecked() },
                }
            }

            /// Returns the reason phrase, e.g: `"OK"`.
            #[inline]
            pub const fn message(&self) -> &'static str {
                match self.0.get() {
                    $(
                        $int => $msg,
                    )*
                    // SAFETY: StatusCode value is privately constructed and immutable
                    _ => unsafe { std::hint::unreachable_unchecked() },
                }
            }
        }

        impl StatusCode {
            $(
                $(#[$doc])*
                pub const $id: Self = Self(NonZeroU16::new($int).unwrap());
            )*
        }
    };
}

status_code! {
    /// `200`. The request succeeded.
    200 OK "OK";
    /// `201`. The request succeeded, and a new resource was created as a result.
    201 CREATED "Created";
    /// `204`. There is no content to send for this request, but the headers are useful.
    204 NO_CONTENT "No Content";
    /// `302`. The URI of the requested resource has been changed temporarily.
    302 FOUND "Found";
    /// `400`. The server cannot or will not process the request due to a client error.
    400 BAD_REQUEST "Bad Request";
    /// `401`. Although the HTTP standard specifies "unauthorized", semantically this
    /// response means "unauthenticated".
    401 UNAUTHORIZED "Unauthorized";
    /// `403`. The client's identity is known to the server, but the client does not
    /// have access rights to the content.
    403 FORBIDDEN "Forbidden";
    /// `404`. The server cannot find the requested resource.
    404 NOT_FOUND "Not Found";
    /// `405`. The request method is known by the server but is not supported by the
    /// target resource.
    405 METHOD_NOT_ALLOWED "Method Not Allowed";
    /// `409`. The request conflicts with the current state of the server.
    409 CONFLICT "Conflict";
    /// `422`. The request was well-formed but could not be followed due to semantic
    /// errors.
    422 UNPROCESSABLE_ENTITY "Unprocessable Entity";
    /// `424`. The request failed because it depended on another action that failed.
    424 FAILED_DEPENDENCY "Failed Dependency";
    /// `500`. The server has encountered a situation it does not know how to handle.
    500 INTERNAL_SERVER_ERROR "Internal Server Error";
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("StatusCode").field(&self.as_str()).finish()
    }
}
