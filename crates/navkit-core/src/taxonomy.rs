//! Keyword-based category suggestion.
//!
//! Title and description are lowercased and searched for plain substrings.
//! Categories are tried in table order and the first whose main keywords
//! match wins; within it, the first matching sub-category is picked.
//! Matching is by substring, so short keywords such as `ai` also hit longer
//! words that contain them.

use crate::models::{CanonicalItem, DEFAULT_CATEGORY};

struct CategoryRule {
    name: &'static str,
    keywords: &'static [&'static str],
    subs: &'static [(&'static str, &'static [&'static str])],
}

const TAXONOMY: &[CategoryRule] = &[
    CategoryRule {
        name: "AI & GPT",
        keywords: &[
            "ai", "gpt", "llm", "chatgpt", "claude", "deepseek", "artificial intelligence", "bot",
            "大模型", "智能", "推理",
        ],
        subs: &[
            ("Chat", &["chat", "对话", "问答"]),
            (
                "Image",
                &["image", "midjourney", "stable diffusion", "dalle", "绘图", "图片", "生成器"],
            ),
            ("Agent", &["agent", "workflow", "automation", "工具链"]),
            ("Tools", &["tool", "helper", "插件"]),
        ],
    },
    CategoryRule {
        name: "Development",
        keywords: &[
            "code", "git", "dev", "api", "sdk", "framework", "library", "editor", "vscode",
            "docker", "linux", "开发", "编程", "代码", "仓库",
        ],
        subs: &[
            (
                "Frontend",
                &["react", "vue", "nextjs", "tailwind", "css", "frontend", "前端", "typescript"],
            ),
            (
                "Backend",
                &[
                    "node", "python", "java", "go", "rust", "database", "sql", "backend", "后端",
                    "api",
                ],
            ),
            ("Tools", &["tool", "debug", "test", "deploy", "github", "工具", "辅助"]),
        ],
    },
    CategoryRule {
        name: "Design",
        keywords: &[
            "design", "ui", "ux", "color", "icon", "svg", "figma", "dribbble", "behance", "font",
            "设计", "配色", "图标", "字体",
        ],
        subs: &[
            ("Inspiration", &["inspiration", "showcase", "gallery", "灵感", "参考"]),
            (
                "Assets",
                &["asset", "resource", "freebie", "template", "素材", "模板", "图片"],
            ),
            ("Tools", &["editor", "create", "layout", "工具"]),
        ],
    },
    CategoryRule {
        name: "Tools",
        keywords: &[
            "tool", "convert", "pdf", "image", "generator", "speedtest", "proxy", "terminal",
            "工具", "助手", "转换", "在线", "加密", "效率",
        ],
        subs: &[
            ("Efficiency", &["efficiency", "productivity", "note", "time", "效率", "笔记", "番茄钟"]),
            ("Web", &["browser", "extension", "search", "网页"]),
            ("DevOps", &["server", "cloud", "host", "vps", "运维"]),
        ],
    },
    CategoryRule {
        name: "Resources",
        keywords: &[
            "learn", "tutorial", "doc", "course", "blog", "news", "article", "wiki", "paper",
            "resource", "资源", "教程", "文档", "博客",
        ],
        subs: &[
            ("Doc", &["documentation", "api", "manual", "文档"]),
            ("Blog", &["article", "post", "news", "博客"]),
            ("Course", &["video", "learning", "class", "课程"]),
        ],
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySuggestion {
    pub category: String,
    pub sub_category: Option<String>,
}

impl CategorySuggestion {
    pub fn is_uncategorized(&self) -> bool {
        self.category == DEFAULT_CATEGORY
    }
}

/// Suggest a category for a bookmark from its title and description.
///
/// Returns [`DEFAULT_CATEGORY`] with no sub-category when nothing matches.
pub fn suggest_category(title: &str, description: &str) -> CategorySuggestion {
    let text = format!("{} {}", title, description).to_lowercase();
    let hit = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    for rule in TAXONOMY {
        if hit(rule.keywords) {
            let sub_category = rule
                .subs
                .iter()
                .find(|(_, keywords)| hit(*keywords))
                .map(|(name, _)| name.to_string());
            return CategorySuggestion {
                category: rule.name.to_string(),
                sub_category,
            };
        }
    }

    CategorySuggestion {
        category: DEFAULT_CATEGORY.to_string(),
        sub_category: None,
    }
}

/// Give an uncategorized item a suggested category. Returns whether it changed.
///
/// Items that already carry a real category are left alone, and so is an
/// existing sub-category.
pub fn categorize(item: &mut CanonicalItem) -> bool {
    if item.category != DEFAULT_CATEGORY {
        return false;
    }
    let suggestion = suggest_category(&item.title, item.description.as_deref().unwrap_or(""));
    if suggestion.is_uncategorized() {
        return false;
    }
    item.category = suggestion.category;
    if item.sub_category.is_none() {
        item.sub_category = suggestion.sub_category;
    }
    true
}
