pub mod request;
pub mod response;

pub use request::{ForwardedError, RequestContext};
pub use response::{Boom, ErrorPayload, ErrorResponse};
