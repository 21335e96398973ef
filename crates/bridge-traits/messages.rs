use std::fmt;

/// A unit of work handed to the loop thread. The context `Ctx` (in
/// `bridge` this is `Rc<Bridge<E>>`) is supplied by the loop's run method
/// at invocation time rather than captured by the closure — which is what
/// lets a `Task` be `Send` even though `Ctx` itself (holding the engine)
/// never is. A task's *captured* environment must still be `Send`; this is
/// how §5's cross-thread submission rule is upheld without ever handing a
/// non-loop-thread caller a live engine handle.
pub type Task<Ctx> = Box<dyn FnOnce(&Ctx) + Send + 'static>;

pub enum LoopMessage<Ctx> {
    Task(Task<Ctx>),
    Shutdown,
}

impl<Ctx> fmt::Debug for LoopMessage<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopMessage::Task(_) => f.write_str("LoopMessage::Task(..)"),
            LoopMessage::Shutdown => f.write_str("LoopMessage::Shutdown"),
        }
    }
}

/// Failure to hand a closure to the loop. Per §4.A, user-scheduling call
/// sites surface this as an explicit error; internal cancellation paths
/// (timer bookkeeping) instead drop the closure silently and never
/// construct this type.
#[derive(Debug, thiserror::Error)]
#[error("cannot submit to a loop that has begun shutdown")]
pub struct SubmitError;
