//! Effects the shell performs on behalf of the core.
//!
//! We use Crux's built-in Render and Http capabilities directly; the timer
//! is ours because the progress ticker needs explicit cancellation.

mod http;
mod timer;

pub use self::http::{
    from_http, ContentType, TransportError, TransportResponse, TransportResult, ValidatedUrl,
    MAX_URL_LENGTH,
};
pub use self::timer::{Timer, TimerId, TimerOperation, TimerOutput};

pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;
// The Effect derive wires the capabilities to the app by this name.
#[allow(unused_imports)]
use crate::app::App;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub timer: Timer<Event>,
}
