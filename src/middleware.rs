use std::rc::Rc;

use actix_utils::future::ok;
use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse},
    http::{header, Method},
    Error, HttpResponse, Result,
};
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use log::{debug, trace};

use crate::CorsPolicy;

/// Service wrapper applying a resolved CORS policy to each request.
///
/// When automatic preflight handling is enabled, `OPTIONS` requests are
/// answered directly with an empty 200 response carrying the computed
/// headers; the wrapped service is never invoked for them. All other
/// requests pass through, and the computed headers are merged into the real
/// response afterwards.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct CorsMiddleware<S> {
    pub(crate) service: S,
    pub(crate) inner: Rc<CorsPolicy>,
}

impl<S> CorsMiddleware<S> {
    fn handle_preflight(inner: &CorsPolicy, req: ServiceRequest) -> ServiceResponse {
        debug!("answering preflight for {} without invoking handler", req.path());

        let origin = inner.match_origin(req.headers().get(header::ORIGIN));

        let mut res = HttpResponse::Ok();

        for (name, value) in inner.build_headers(&origin, req.head(), true) {
            res.insert_header((name, value));
        }

        if let Some(vary) = inner.vary_value(&origin, None) {
            res.insert_header((header::VARY, vary));
        }

        let res = res.finish();
        req.into_response(res)
    }

    fn augment_response<B>(inner: &CorsPolicy, mut res: ServiceResponse<B>) -> ServiceResponse<B> {
        let origin = inner.match_origin(res.request().headers().get(header::ORIGIN));

        if !origin.allowed {
            debug!("request origin is not allowed; no origin will be echoed");
        }

        let headers = inner.build_headers(&origin, res.request().head(), false);
        trace!("augmenting response with headers: {:?}", headers);

        for (name, value) in headers {
            res.headers_mut().insert(name, value);
        }

        let vary = inner.vary_value(&origin, res.headers().get(header::VARY));
        if let Some(vary) = vary {
            res.headers_mut().insert(header::VARY, vary);
        }

        res
    }
}

impl<S, B> Service<ServiceRequest> for CorsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,

    B: MessageBody + 'static,
    B::Error: Into<Error>,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<EitherBody<B>>, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.inner.automatic_options && req.method() == Method::OPTIONS {
            let res = Self::handle_preflight(&self.inner, req);
            ok(res.map_into_right_body()).boxed_local()
        } else {
            let inner = Rc::clone(&self.inner);
            let fut = self.service.call(req);

            async move {
                // handler errors propagate untouched; the middleware is
                // purely additive to successful responses
                let res = fut.await?;
                Ok(Self::augment_response(&inner, res).map_into_left_body())
            }
            .boxed_local()
        }
    }
}
