//! Turns extraction entry points into `(context, next)` middleware steps.
//!
//! An [`Extractor`] works on a raw `http::Request`: it consumes the body and
//! leaves an [`UploadedForm`] in the request extensions. An [`Adapted`]
//! step runs that extractor on the context's inbound request, copies the
//! populated slots onto the context's [`RequestView`] (when it has one) and
//! then continues the chain. Errors are returned unchanged and stop the chain.

use crate::{
    errors::UploadError,
    models::{
        file::UploadedFile,
        form::{FormBody, Files, UploadedForm},
        selector::{FieldSpec, Selector},
    },
    services::upload_service::{Extractor, Multer},
};
use axum::{
    body::Body,
    extract::{Request, State},
    http,
    middleware::Next,
    response::Response,
};
use std::future::Future;
use tracing::debug;

/// Higher-level view of a request that adapted middleware copies results to.
#[derive(Debug, Clone, Default)]
pub struct RequestView {
    pub body: Option<FormBody>,
    pub file: Option<UploadedFile>,
    pub files: Option<Files>,
}

/// Anything that carries an inbound request through a middleware chain.
pub trait UploadContext: Send {
    /// The raw inbound request the extractor reads from.
    fn req_mut(&mut self) -> &mut http::Request<Body>;

    /// The secondary request view, if this context has one.
    fn request_mut(&mut self) -> Option<&mut RequestView> {
        None
    }
}

/// A bare request has no secondary view; results stay in its extensions.
impl UploadContext for http::Request<Body> {
    fn req_mut(&mut self) -> &mut http::Request<Body> {
        self
    }
}

/// A request paired with an optional request view.
#[derive(Debug)]
pub struct Context {
    pub req: http::Request<Body>,
    pub request: Option<RequestView>,
}

impl Context {
    pub fn new(req: http::Request<Body>) -> Self {
        Self {
            req,
            request: Some(RequestView::default()),
        }
    }

    pub fn without_view(req: http::Request<Body>) -> Self {
        Self { req, request: None }
    }
}

impl UploadContext for Context {
    fn req_mut(&mut self) -> &mut http::Request<Body> {
        &mut self.req
    }

    fn request_mut(&mut self) -> Option<&mut RequestView> {
        self.request.as_mut()
    }
}

/// An extractor usable as a middleware step.
#[derive(Clone)]
pub struct Adapted {
    extractor: Extractor,
}

impl Adapted {
    pub fn new(extractor: Extractor) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Extract and copy results onto `ctx`, without a continuation.
    pub async fn run<C: UploadContext>(&self, mut ctx: C) -> Result<C, UploadError> {
        self.apply(&mut ctx).await?;
        Ok(ctx)
    }

    /// Extract, copy results onto `ctx`, then hand it to `next`.
    ///
    /// `next` is not invoked when extraction fails.
    pub async fn call<C, N, Fut>(&self, mut ctx: C, next: N) -> Result<Fut::Output, UploadError>
    where
        C: UploadContext,
        N: FnOnce(C) -> Fut,
        Fut: Future,
    {
        self.apply(&mut ctx).await?;
        Ok(next(ctx).await)
    }

    async fn apply<C: UploadContext>(&self, ctx: &mut C) -> Result<(), UploadError> {
        let inbound = std::mem::replace(ctx.req_mut(), http::Request::new(Body::empty()));
        *ctx.req_mut() = self.extractor.handle(inbound).await?;

        let parsed = ctx.req_mut().extensions().get::<UploadedForm>().cloned();
        let Some(parsed) = parsed else {
            return Ok(());
        };
        let Some(view) = ctx.request_mut() else {
            debug!(
                selector = self.extractor.selector().name(),
                "context has no request view, results left on the raw request"
            );
            return Ok(());
        };

        if let Some(body) = parsed.body {
            view.body = Some(body);
        }
        if let Some(file) = parsed.file {
            view.file = Some(file);
        }
        if let Some(files) = parsed.files {
            view.files = Some(files);
        }
        Ok(())
    }
}

/// A `Multer` whose entry points yield [`Adapted`] steps.
#[derive(Clone)]
pub struct AdaptedMulter {
    multer: Multer,
}

/// Wrap `multer` so its entry points become middleware steps.
pub fn adapt(multer: Multer) -> AdaptedMulter {
    AdaptedMulter { multer }
}

impl AdaptedMulter {
    pub fn multer(&self) -> &Multer {
        &self.multer
    }

    /// Adapt the entry point named by `selector`.
    pub fn adapt(&self, selector: Selector) -> Adapted {
        Adapted::new(self.multer.extractor(selector))
    }

    pub fn single(&self, name: impl Into<String>) -> Adapted {
        self.adapt(Selector::Single(name.into()))
    }

    pub fn array(&self, name: impl Into<String>, max_count: Option<usize>) -> Adapted {
        self.adapt(Selector::Array(name.into(), max_count))
    }

    pub fn fields(&self, fields: impl IntoIterator<Item = FieldSpec>) -> Adapted {
        self.adapt(Selector::Fields(fields.into_iter().collect()))
    }

    pub fn any(&self) -> Adapted {
        self.adapt(Selector::Any)
    }

    pub fn none(&self) -> Adapted {
        self.adapt(Selector::None)
    }
}

/// axum middleware running an [`Adapted`] step before the inner service.
///
/// Mount with `axum::middleware::from_fn_with_state(adapted, upload_middleware)`.
/// Handlers read the results from the [`UploadedForm`] request extension.
pub async fn upload_middleware(
    State(upload): State<Adapted>,
    req: Request,
    next: Next,
) -> Result<Response, UploadError> {
    upload.call(req, |req| next.run(req)).await
}
