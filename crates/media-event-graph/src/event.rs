//! Event envelope carried on node data channels.

use std::any::Any;
use std::fmt;

/// Completion callback run after the receiving node handled the event.
pub type EventCallback = Box<dyn FnOnce() + Send + 'static>;

/// Immutable command/payload envelope.
///
/// `cmd` numbering belongs to the application; the graph's own protocol
/// travels on separate channels and never shares this space. The payload is
/// untyped: receivers match on `cmd` and downcast by convention.
pub struct Event {
    cmd: i32,
    obj: Box<dyn Any + Send>,
    callback: Option<EventCallback>,
}

impl Event {
    pub fn new<T>(cmd: i32, obj: T) -> Self
    where
        T: Any + Send,
    {
        Self {
            cmd,
            obj: Box::new(obj),
            callback: None,
        }
    }

    /// Creates an event without payload.
    pub fn signal(cmd: i32) -> Self {
        Self::new(cmd, ())
    }

    /// Creates an event whose `callback` runs on the receiver's data loop
    /// right after `on_event` returns.
    pub fn with_callback<T, F>(cmd: i32, obj: T, callback: F) -> Self
    where
        T: Any + Send,
        F: FnOnce() + Send + 'static,
    {
        Self {
            cmd,
            obj: Box::new(obj),
            callback: Some(Box::new(callback)),
        }
    }

    pub fn cmd(&self) -> i32 {
        self.cmd
    }

    pub fn obj<T: Any>(&self) -> Option<&T> {
        self.obj.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.obj.is::<T>()
    }

    /// Takes the payload out, or returns the event untouched when the payload
    /// is not a `T`.
    pub fn into_obj<T: Any>(self) -> Result<T, Self> {
        let Self { cmd, obj, callback } = self;
        match obj.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(obj) => Err(Self { cmd, obj, callback }),
        }
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn take_callback(&mut self) -> Option<EventCallback> {
        self.callback.take()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("cmd", &self.cmd)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}
