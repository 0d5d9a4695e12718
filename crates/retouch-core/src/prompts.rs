//! 추천 편집 지시문 테이블.
//!
//! 사용 맥락별 큐레이션 목록 + 공통 기본 목록. I/O 없는 순수 조회.

/// 모든 맥락에 붙는 기본 지시문
const BASE_PROMPTS: &[&str] = &[
    "Improve lighting and contrast",
    "Remove background clutter",
    "Sharpen details",
    "Correct color balance",
];

const FIELD_LOG_PROMPTS: &[&str] = &[
    "Highlight the damaged area",
    "Annotate measurements clearly",
    "Brighten the job site photo",
];

const CHAT_PROMPTS: &[&str] = &[
    "Make it look professional",
    "Crop to the main subject",
];

const DOCUMENT_PROMPTS: &[&str] = &[
    "Straighten and flatten the page",
    "Increase text legibility",
    "Convert to clean black and white scan",
];

const CALENDAR_PROMPTS: &[&str] = &["Create a clean thumbnail", "Add a subtle border"];

/// 사용 맥락
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptContext {
    FieldLog,
    Chat,
    Document,
    Calendar,
}

impl PromptContext {
    /// 맥락 문자열 파싱 (알 수 없으면 None)
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "field-log" => Some(Self::FieldLog),
            "chat" => Some(Self::Chat),
            "document" => Some(Self::Document),
            "calendar" => Some(Self::Calendar),
            _ => None,
        }
    }

    fn prompts(&self) -> &'static [&'static str] {
        match self {
            Self::FieldLog => FIELD_LOG_PROMPTS,
            Self::Chat => CHAT_PROMPTS,
            Self::Document => DOCUMENT_PROMPTS,
            Self::Calendar => CALENDAR_PROMPTS,
        }
    }
}

/// 맥락별 추천 지시문: 맥락 목록 뒤에 기본 목록을 이어 붙인다
///
/// 알 수 없는 맥락이면 기본 목록만 반환.
pub fn suggested_prompts(context: &str) -> Vec<&'static str> {
    let specific = PromptContext::parse(context)
        .map(|c| c.prompts())
        .unwrap_or(&[]);
    specific.iter().chain(BASE_PROMPTS.iter()).copied().collect()
}
