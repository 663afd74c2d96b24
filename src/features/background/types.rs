/// `POST /remove-bg` 的 multipart 表单（仅用于 OpenAPI 文档）
#[derive(Debug, utoipa::ToSchema)]
pub struct RemoveBgUpload {
    /// 待处理的图片文件，格式不限（需能被解码）
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
