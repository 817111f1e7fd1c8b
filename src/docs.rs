use utoipa::OpenApi;

use crate::modules::jobs::dto::*;
use crate::modules::jobs::model::{CompletedMarker, JobState};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::jobs::handler::upload,
        crate::modules::jobs::handler::convert,
        crate::modules::jobs::handler::download,
        crate::modules::jobs::handler::status,
    ),
    components(
        schemas(
            UploadRequest, UploadResponse, ConvertRequest, ConvertResponse,
            StatusResponse, JobState, CompletedMarker,
        )
    ),
    tags(
        (name = "Jobs", description = "Upload, HLS conversion and download")
    )
)]
pub struct ApiDoc;
