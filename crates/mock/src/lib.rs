//! In-process host for exercising `hostlink-bridge` without a desktop shell.

pub mod error;
pub mod events;
pub mod handler;
pub mod host;
pub mod mocks;
pub mod registry;

pub use error::MockError;
pub use events::EventHub;
pub use handler::{CommandHandler, FnHandler, HostContext, HostReply, StaticHandler};
pub use host::{CallRecord, MockHost};
pub use mocks::{clear_mocks, mock_convert_file_src, mock_ipc, mock_windows};
pub use registry::HandlerRegistry;
