//! View state: the current focus and multi-session flag

use std::sync::Arc;

use crate::session::{Session, StackFrame, Thread};

/// The focused session/thread/stack-frame triple
///
/// Mutually consistent by construction: a focused frame implies a focused
/// thread and session, a focused thread implies a focused session.
pub struct ViewModel {
    focused_session: Option<Arc<Session>>,
    focused_thread: Option<Thread>,
    focused_frame: Option<StackFrame>,
    multi_session_view: bool,
    first_session_start: bool,
}

impl ViewModel {
    pub fn new() -> Self {
        Self {
            focused_session: None,
            focused_thread: None,
            focused_frame: None,
            multi_session_view: false,
            first_session_start: true,
        }
    }

    pub fn focused_session(&self) -> Option<Arc<Session>> {
        self.focused_session.clone()
    }

    pub fn focused_thread(&self) -> Option<Thread> {
        self.focused_thread.clone()
    }

    pub fn focused_stack_frame(&self) -> Option<StackFrame> {
        self.focused_frame.clone()
    }

    /// Replace the focus triple wholesale
    pub fn set_focus(
        &mut self,
        frame: Option<StackFrame>,
        thread: Option<Thread>,
        session: Option<Arc<Session>>,
    ) {
        debug_assert!(frame.is_none() || thread.is_some());
        debug_assert!(thread.is_none() || session.is_some());
        self.focused_frame = frame;
        self.focused_thread = thread;
        self.focused_session = session;
    }

    pub fn multi_session_view(&self) -> bool {
        self.multi_session_view
    }

    pub fn set_multi_session_view(&mut self, multi: bool) {
        self.multi_session_view = multi;
    }

    /// True until the first session ever launches
    pub fn first_session_start(&self) -> bool {
        self.first_session_start
    }

    pub fn set_first_session_start(&mut self, first: bool) {
        self.first_session_start = first;
    }
}
