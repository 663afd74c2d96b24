/// 去背景接口（上传 → 去背景 → RGBA PNG）
pub mod background;

/// 健康检查
pub mod health;
