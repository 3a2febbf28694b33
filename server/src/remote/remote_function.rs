use std::{
    cell::Cell,
    fmt::Display,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use tether_shared::{
    from_payload, panic_message, to_payload, CommError, Disposable, MiddlewareContext, ObserverId,
    Payload, RemoteId, Step, Value,
};

use crate::{
    remote::FunctionOptions,
    server::{CallHandler, Server},
};

/// Handle to a function bound on the server. Observers call it through
/// `ClientRemoteFunction`.
#[derive(Clone)]
pub struct RemoteFunction {
    server: Server,
    remote: RemoteId,
    destroyed: Rc<Cell<bool>>,
}

impl RemoteFunction {
    pub(crate) fn bind<Req, Res, E, F>(
        server: &Server,
        remote: RemoteId,
        handler: F,
        options: FunctionOptions<Req, Res>,
    ) -> Result<Self, CommError>
    where
        Req: Payload,
        Res: Payload,
        E: Display,
        F: Fn(ObserverId, Req) -> Result<Res, E> + 'static,
    {
        let call_remote = remote.clone();
        let call_handler: CallHandler = Rc::new(move |observer: ObserverId, payload: &Value| {
            let context = MiddlewareContext::new(&call_remote, Some(observer));
            let serve = || -> Result<Value, String> {
                let request: Req = from_payload(payload).map_err(|error| error.to_string())?;

                let response = match options.inbound.try_run(&context, request)? {
                    Step::Halt(response) => {
                        return to_payload(&response).map_err(|error| error.to_string())
                    }
                    Step::Continue(request) => invoke(&handler, observer, request)?,
                };

                let response = options.outbound.try_run(&context, response)?.into_inner();
                to_payload(&response).map_err(|error| error.to_string())
            };
            // a panic must never unwind into the server's receive loop
            panic::catch_unwind(AssertUnwindSafe(serve)).unwrap_or_else(|payload| {
                Err(format!(
                    "call panicked: {}",
                    panic_message(payload.as_ref())
                ))
            })
        });

        server.register_call(&remote, call_handler)?;

        Ok(Self {
            server: server.clone(),
            remote,
            destroyed: Rc::new(Cell::new(false)),
        })
    }

    pub fn remote(&self) -> &RemoteId {
        &self.remote
    }

    /// Unbinds the handler. Calls already answered are unaffected; later
    /// calls fail.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.server.unregister(&self.remote);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

impl Disposable for RemoteFunction {
    fn dispose(&self) {
        self.destroy();
    }
}

fn invoke<Req, Res, E: Display>(
    handler: &impl Fn(ObserverId, Req) -> Result<Res, E>,
    observer: ObserverId,
    request: Req,
) -> Result<Res, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(observer, request))) {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(error)) => Err(error.to_string()),
        Err(payload) => Err(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}
