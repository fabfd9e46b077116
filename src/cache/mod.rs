pub(crate) mod fingerprint;
pub(crate) mod frame_cache;
pub(crate) mod prerender;
