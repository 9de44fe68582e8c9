//! Storage service wire constants

/// Path prefix every storage route is mounted under
pub const STORAGE_PATH_PREFIX: &str = "/v1alpha1/api/core/storage";

/// Multipart field carrying the uploaded blob
pub const UPLOAD_FIELD: &str = "uploadfile";

/// `kind` reported in references to blobs held by the local storage backend
pub const LOCAL_STORAGE_KIND: &str = "localstorage.v1alpha1.core.gantry.dev";

/// Upload filename the resolver uses for an archive with the given id
pub fn archive_filename(id: &str) -> String {
    format!("{}.tar.gz", id)
}
