//! 任务结果引用
//!
//! 后端的 `result` 字段有三种形态：单个 key、key 数组、带命名字段的对象。
//! 在这里一次性解析为 `ResultRef`，调用方不再判断 JSON 形态。

use serde_json::Value as JsonValue;

/// 产物类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Gif,
    Mp4,
    Webp,
}

impl ArtifactKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ArtifactKind::Gif => "image/gif",
            ArtifactKind::Mp4 => "video/mp4",
            ArtifactKind::Webp => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Gif => "gif",
            ArtifactKind::Mp4 => "mp4",
            ArtifactKind::Webp => "webp",
        }
    }

    /// 根据 key 的扩展名推断类型，无法识别时视为 GIF
    pub fn from_key(key: &str) -> Self {
        let ext = key
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" => ArtifactKind::Mp4,
            "webp" => ArtifactKind::Webp,
            _ => ArtifactKind::Gif,
        }
    }
}

/// 单个待下载的产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    pub key: String,
}

/// 结构化结果：主产物 GIF，外加可选的其他编码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub gif: String,
    pub mp4: Option<String>,
    pub webp: Option<String>,
}

/// 任务结果引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultRef {
    /// 单个 key
    Key(String),
    /// key 数组，第一个为主产物
    Keys(Vec<String>),
    /// 命名字段对象
    Artifacts(ArtifactSet),
}

impl ResultRef {
    /// 从 `result` 字段解析
    ///
    /// 空字符串、空数组、缺少主产物的对象以及 null 都返回 None，
    /// 避免把"状态已翻转但结果未就绪"当成成功
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(key) => non_empty(key).map(ResultRef::Key),
            JsonValue::Array(items) => {
                let keys: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter_map(non_empty)
                    .collect();
                if keys.is_empty() {
                    None
                } else {
                    Some(ResultRef::Keys(keys))
                }
            }
            JsonValue::Object(map) => {
                let field = |names: &[&str]| {
                    names
                        .iter()
                        .find_map(|name| map.get(*name).and_then(|v| v.as_str()))
                        .and_then(non_empty)
                };
                let gif = field(&["gif", "gif_key", "result"])?;
                Some(ResultRef::Artifacts(ArtifactSet {
                    gif,
                    mp4: field(&["mp4", "mp4_key"]),
                    webp: field(&["webp", "webp_key"]),
                }))
            }
            _ => None,
        }
    }

    /// 主产物
    pub fn primary(&self) -> ArtifactRef {
        match self {
            ResultRef::Key(key) => ArtifactRef {
                kind: ArtifactKind::from_key(key),
                key: key.clone(),
            },
            // Keys 在构造时保证非空
            ResultRef::Keys(keys) => {
                let key = keys.first().cloned().unwrap_or_default();
                ArtifactRef {
                    kind: ArtifactKind::from_key(&key),
                    key,
                }
            }
            ResultRef::Artifacts(set) => ArtifactRef {
                kind: ArtifactKind::Gif,
                key: set.gif.clone(),
            },
        }
    }

    /// 可选的次要产物，下载失败不影响主结果
    pub fn secondaries(&self) -> Vec<ArtifactRef> {
        match self {
            ResultRef::Key(_) => Vec::new(),
            ResultRef::Keys(keys) => keys
                .iter()
                .skip(1)
                .map(|key| ArtifactRef {
                    kind: ArtifactKind::from_key(key),
                    key: key.clone(),
                })
                .collect(),
            ResultRef::Artifacts(set) => [
                (ArtifactKind::Mp4, &set.mp4),
                (ArtifactKind::Webp, &set.webp),
            ]
            .into_iter()
            .filter_map(|(kind, key)| {
                key.as_ref().map(|key| ArtifactRef {
                    kind,
                    key: key.clone(),
                })
            })
            .collect(),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
