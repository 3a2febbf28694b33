use smol::Timer;

use tether_shared::{
    from_payload, to_payload, CommError, MiddlewareContext, Payload, Pipeline, Promise, RemoteId,
};

use crate::{client::Client, remote::FunctionOptions};

/// The observer's handle to a function bound on the server
pub struct ClientRemoteFunction<Req: Payload, Res: Payload> {
    client: Client,
    remote: RemoteId,
    inbound: Pipeline<Res>,
    outbound: Pipeline<Req>,
}

impl<Req: Payload, Res: Payload> Clone for ClientRemoteFunction<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            remote: self.remote.clone(),
            inbound: self.inbound.clone(),
            outbound: self.outbound.clone(),
        }
    }
}

impl<Req: Payload, Res: Payload> ClientRemoteFunction<Req, Res> {
    pub(crate) fn new(client: &Client, remote: RemoteId, options: FunctionOptions<Req, Res>) -> Self {
        Self {
            client: client.clone(),
            remote,
            inbound: options.inbound,
            outbound: options.outbound,
        }
    }

    pub fn remote(&self) -> &RemoteId {
        &self.remote
    }

    /// Calls the function and suspends until the server responds
    pub async fn invoke(&self, args: Req) -> Result<Res, CommError> {
        self.invoke_async(args).await
    }

    /// Calls the function and returns a [`Promise`] of its result right
    /// away. The request is sent before this returns.
    ///
    /// A panicking middleware rejects the promise with
    /// [`CommError::RemoteCallFailed`].
    pub fn invoke_async(&self, args: Req) -> Promise<Res> {
        let context = MiddlewareContext::new(&self.remote, None);
        let args = match self.outbound.try_run(&context, args) {
            Ok(step) => step.into_inner(),
            Err(reason) => return Promise::rejected(self.failed(reason)),
        };
        let payload = match to_payload(&args) {
            Ok(payload) => payload,
            Err(error) => return Promise::rejected(error.into()),
        };

        let request = self.client.request(&self.remote, payload);
        let inbound = self.inbound.clone();
        let call = async move {
            let value = request.await?;
            let response: Res = from_payload(&value)?;
            match inbound.try_run(&context, response) {
                Ok(step) => Ok::<Res, CommError>(step.into_inner()),
                Err(reason) => Err(CommError::RemoteCallFailed {
                    remote: context.remote,
                    reason,
                }),
            }
        };

        let scheduler = self.client.scheduler();
        match self.client.config().call_timeout {
            None => Promise::spawn(scheduler, call),
            Some(after) => Promise::spawn(
                scheduler,
                smol::future::or(call, async move {
                    Timer::after(after).await;
                    Err(CommError::Timeout { after })
                }),
            ),
        }
    }

    fn failed(&self, reason: String) -> CommError {
        CommError::RemoteCallFailed {
            remote: self.remote.clone(),
            reason,
        }
    }
}
