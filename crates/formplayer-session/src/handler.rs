use crate::blocking::BlockingStatus;
use crate::envelope::Response;
use crate::errors::ErrorReport;

/// Hooks a session calls as its requests progress. Every hook defaults to
/// doing nothing.
pub trait SessionHandler: Send + Sync {
    /// A `new-form` response built the form.
    fn on_load(&self, _response: &Response) {}

    fn on_error(&self, _report: &ErrorReport) {}

    /// The server accepted the submitted form.
    fn on_submit(&self, _response: &Response) {}

    /// The first outstanding request was registered.
    fn on_loading(&self) {}

    /// The last outstanding request finished.
    fn on_loading_complete(&self) {}

    /// The blocking status moved; UIs gate their submit control on it.
    fn on_blocking_changed(&self, _status: BlockingStatus) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl SessionHandler for NoopHandler {}
