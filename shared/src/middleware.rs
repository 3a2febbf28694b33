use std::{
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use log::debug;

use crate::{
    signal::panic_message,
    types::{ObserverId, RemoteId},
};

/// Outcome of a single middleware function, and of a whole [`Pipeline`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step<A, R = A> {
    /// Hand the (possibly rewritten) arguments to the next stage
    Continue(A),
    /// Stop the pipeline; the carried value becomes the final result
    Halt(R),
}

impl<A, R> Step<A, R> {
    pub fn is_continue(&self) -> bool {
        matches!(self, Step::Continue(_))
    }
}

impl<A> Step<A, A> {
    /// The value that comes out of the pipeline, whether it ran to the end
    /// or halted early
    pub fn into_inner(self) -> A {
        match self {
            Step::Continue(value) | Step::Halt(value) => value,
        }
    }
}

/// What a middleware function can see about the message it is processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiddlewareContext {
    pub remote: RemoteId,
    /// The peer the message came from or is going to. `None` when the
    /// message is broadcast, or on the client where the peer is always the
    /// server.
    pub observer: Option<ObserverId>,
}

impl MiddlewareContext {
    pub fn new(remote: &RemoteId, observer: Option<ObserverId>) -> Self {
        Self {
            remote: remote.clone(),
            observer,
        }
    }
}

pub type Middleware<A, R = A> = Rc<dyn Fn(&MiddlewareContext, A) -> Step<A, R>>;

/// Ordered list of middleware applied to inbound or outbound arguments.
///
/// Whether the pipeline is a passthrough is decided while it is built, so
/// running an empty pipeline costs a single branch.
pub struct Pipeline<A, R = A> {
    middleware: Vec<Middleware<A, R>>,
    passthrough: bool,
}

impl<A, R> Clone for Pipeline<A, R> {
    fn clone(&self) -> Self {
        Self {
            middleware: self.middleware.clone(),
            passthrough: self.passthrough,
        }
    }
}

impl<A, R> Default for Pipeline<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> Pipeline<A, R> {
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
            passthrough: true,
        }
    }

    /// Appends a middleware function to the end of the pipeline
    pub fn with(mut self, middleware: impl Fn(&MiddlewareContext, A) -> Step<A, R> + 'static) -> Self {
        self.middleware.push(Rc::new(middleware));
        self.passthrough = false;
        self
    }

    pub fn from_middleware(middleware: Vec<Middleware<A, R>>) -> Self {
        let passthrough = middleware.is_empty();
        Self {
            middleware,
            passthrough,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passthrough
    }

    /// Runs `args` through every middleware in registration order, stopping
    /// at the first one that halts
    pub fn run(&self, context: &MiddlewareContext, args: A) -> Step<A, R> {
        if self.passthrough {
            return Step::Continue(args);
        }

        let mut args = args;
        for (index, middleware) in self.middleware.iter().enumerate() {
            match middleware(context, args) {
                Step::Continue(next) => args = next,
                Step::Halt(result) => {
                    debug!(
                        "middleware #{} halted pipeline for {} (observer: {:?})",
                        index, context.remote, context.observer
                    );
                    return Step::Halt(result);
                }
            }
        }
        Step::Continue(args)
    }

    /// Like [`Pipeline::run`], but a panicking middleware yields `Err` with
    /// the panic message instead of unwinding into the caller
    pub fn try_run(&self, context: &MiddlewareContext, args: A) -> Result<Step<A, R>, String> {
        if self.passthrough {
            return Ok(Step::Continue(args));
        }
        panic::catch_unwind(AssertUnwindSafe(|| self.run(context, args))).map_err(|payload| {
            format!(
                "middleware panicked on {}: {}",
                context.remote,
                panic_message(payload.as_ref())
            )
        })
    }
}
