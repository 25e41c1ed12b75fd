use std::fmt;
use std::time::Duration;

use crate::services::PollConfig;

/// 处理工具枚举
///
/// 每个工具对应后端一个 `POST /api/<job-kind>` 接口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    /// 裁剪
    Crop,
    /// 缩放
    Resize,
    /// 倒放
    Reverse,
    /// 压缩优化
    Optimize,
    /// 添加文字
    AddText,
    /// 图片合成 GIF
    GifMaker,
    /// 视频转 GIF
    VideoToGif,
}

const GIF_EXTENSIONS: &[&str] = &["gif"];
const IMAGE_EXTENSIONS: &[&str] = &["gif", "png", "jpg", "jpeg", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "avi", "mkv"];

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::Crop,
        ToolKind::Resize,
        ToolKind::Reverse,
        ToolKind::Optimize,
        ToolKind::AddText,
        ToolKind::GifMaker,
        ToolKind::VideoToGif,
    ];

    /// 接口路径中的 job-kind 片段
    pub fn endpoint(self) -> &'static str {
        match self {
            ToolKind::Crop => "crop",
            ToolKind::Resize => "resize",
            ToolKind::Reverse => "reverse",
            ToolKind::Optimize => "optimize",
            ToolKind::AddText => "add-text",
            ToolKind::GifMaker => "gif-maker",
            ToolKind::VideoToGif => "video-to-gif",
        }
    }

    /// 该工具接受的源文件扩展名（小写）
    pub fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            ToolKind::GifMaker => IMAGE_EXTENSIONS,
            ToolKind::VideoToGif => VIDEO_EXTENSIONS,
            _ => GIF_EXTENSIONS,
        }
    }

    /// 工具默认的轮询节奏
    ///
    /// 视频转码耗时更长，使用更大的步长和次数上限
    pub fn default_poll_config(self) -> PollConfig {
        match self {
            ToolKind::VideoToGif => PollConfig::default()
                .with_initial_delay(Duration::from_millis(2000))
                .with_max_delay(Duration::from_millis(5000))
                .with_max_attempts(90),
            _ => PollConfig::default(),
        }
    }

    /// 从接口片段解析工具
    pub fn from_endpoint(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.endpoint() == s)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_round_trips_through_from_endpoint() {
        for tool in ToolKind::ALL {
            assert_eq!(ToolKind::from_endpoint(tool.endpoint()), Some(tool));
        }
        assert_eq!(ToolKind::from_endpoint("blur"), None);
    }

    #[test]
    fn video_to_gif_polls_longer() {
        let video = ToolKind::VideoToGif.default_poll_config();
        let crop = ToolKind::Crop.default_poll_config();
        assert!(video.max_attempts > crop.max_attempts);
        assert!(video.max_delay > crop.max_delay);
    }
}
