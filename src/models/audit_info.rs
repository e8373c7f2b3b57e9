//! 报告中展示的审计说明文字

use phf::phf_map;

/// 面向老年用户的无障碍分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessibilityCategory {
    Vision,
    Motor,
    Cognitive,
    Performance,
    Security,
    Technical,
}

/// 分类配色（背景 / 边框 / 文字）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryColors {
    pub bg: &'static str,
    pub border: &'static str,
    pub text: &'static str,
}

impl AccessibilityCategory {
    pub fn title(self) -> &'static str {
        match self {
            AccessibilityCategory::Vision => "Vision Accessibility",
            AccessibilityCategory::Motor => "Motor Accessibility",
            AccessibilityCategory::Cognitive => "Cognitive Accessibility",
            AccessibilityCategory::Performance => "Performance for Seniors",
            AccessibilityCategory::Security => "Security for Seniors",
            AccessibilityCategory::Technical => "Technical Accessibility",
        }
    }

    pub fn colors(self) -> CategoryColors {
        match self {
            AccessibilityCategory::Vision => CategoryColors { bg: "#E3F2FD", border: "#1976D2", text: "#0D47A1" },
            AccessibilityCategory::Motor => CategoryColors { bg: "#F3E5F5", border: "#7B1FA2", text: "#4A148C" },
            AccessibilityCategory::Cognitive => CategoryColors { bg: "#E8F5E8", border: "#388E3C", text: "#1B5E20" },
            AccessibilityCategory::Performance => CategoryColors { bg: "#FFF3E0", border: "#F57C00", text: "#E65100" },
            AccessibilityCategory::Security => CategoryColors { bg: "#FFEBEE", border: "#D32F2F", text: "#B71C1C" },
            AccessibilityCategory::Technical => CategoryColors { bg: "#F5F5F5", border: "#616161", text: "#212121" },
        }
    }
}

/// 完整报告中每个审计的说明
#[derive(Debug, Clone, Copy)]
pub struct AuditInfo {
    pub title: &'static str,
    pub category: AccessibilityCategory,
    pub importance: &'static str,
    pub why: &'static str,
    pub recommendation: &'static str,
}

/// 快速扫描报告中的简版说明
#[derive(Debug, Clone, Copy)]
pub struct LiteAuditInfo {
    pub id: &'static str,
    pub title: &'static str,
    pub impact: &'static str,
}

use AccessibilityCategory::*;

pub static AUDIT_INFO: phf::Map<&'static str, AuditInfo> = phf_map! {
    "text-font-audit" => AuditInfo {
        title: "Text Size and Readability Analysis",
        category: Vision,
        importance: "Font size is critical for elderly users who often experience presbyopia. Text smaller than 16px can be extremely difficult to read, causing eye strain.",
        why: "Age-related vision changes make small text nearly impossible to read. Seniors need larger fonts to browse websites comfortably.",
        recommendation: "Ensure all body text is at least 16 pixels. Use relative units like \"rem\" to allow users to easily scale the font size in their browser settings.",
    },
    "color-contrast" => AuditInfo {
        title: "Color Contrast for Clear Vision",
        category: Vision,
        importance: "Adequate color contrast is essential for seniors whose vision may be affected by cataracts or macular degeneration, making text invisible.",
        why: "Aging eyes require higher contrast to distinguish text from backgrounds. Without it, content becomes inaccessible.",
        recommendation: "Aim for a contrast ratio of at least 4.5:1 for normal text and 3:1 for large text to meet WCAG AA standards, ensuring readability for most users.",
    },
    "interactive-color-audit" => AuditInfo {
        title: "Interactive Elements Visual Clarity",
        category: Vision,
        importance: "Seniors need clear visual cues to identify clickable elements. Relying on color alone can make navigation impossible for those with color vision changes.",
        why: "Reduced visual acuity makes it difficult to distinguish interactive elements without clear, multi-sensory indicators (e.g., underlines, icons).",
        recommendation: "Do not rely on color alone to indicate interactivity. Combine color with other visual cues like underlines for links or bold font weight for buttons.",
    },
    "font-size" => AuditInfo {
        title: "Overall Font Size Assessment",
        category: Vision,
        importance: "Consistent, readable font sizes ensure seniors can access all content without strain. Mixed small font sizes create accessibility barriers.",
        why: "Predictable, large font sizes help elderly users read content comfortably and maintain their independence online.",
        recommendation: "Audit the entire site to ensure no text (other than logos or decorative text) falls below a 16 pixel computed size.",
    },
    "target-size" => AuditInfo {
        title: "Touch Target Size for Seniors",
        category: Motor,
        importance: "Seniors often experience tremors or arthritis. Small buttons and links are difficult to accurately tap, creating barriers to use.",
        why: "Age-related motor changes require larger, well-spaced interactive elements. Small targets lead to frustration and prevent task completion.",
        recommendation: "Ensure all buttons, links, and other interactive elements are at least 48x48 pixels. Provide ample spacing between targets to prevent accidental taps.",
    },
    "layout-brittle-audit" => AuditInfo {
        title: "Text Spacing Flexibility for Readability",
        category: Motor,
        importance: "Seniors often need to increase text spacing for better readability. Rigid layouts that break when text spacing is adjusted prevent this customization.",
        why: "Many seniors require personalized text spacing to read comfortably. Inflexible layouts deny them this ability.",
        recommendation: "Use flexible layout techniques (like CSS Flexbox or Grid) and avoid fixed heights on containers with text to ensure the layout adapts to user-adjusted text spacing.",
    },
    "heading-order" => AuditInfo {
        title: "Logical Content Structure",
        category: Cognitive,
        importance: "Proper heading hierarchy helps seniors understand content organization. A confusing structure increases cognitive load.",
        why: "Clear information hierarchy reduces cognitive burden and helps seniors find and understand content without becoming overwhelmed.",
        recommendation: "Structure content with a single H1 heading, followed by H2s for main sections, H3s for sub-sections, etc. Do not skip heading levels.",
    },
    "button-name" => AuditInfo {
        title: "Clear Button Labels",
        category: Cognitive,
        importance: "Seniors benefit from descriptive button names that clearly explain the resulting action. Vague labels like \"Click here\" create confusion.",
        why: "Clear, descriptive labels help seniors understand website functionality and build confidence in their interactions.",
        recommendation: "Button text should describe the action it will perform. For example, use \"Submit Application\" or \"Download Report\" instead of generic labels.",
    },
    "link-name" => AuditInfo {
        title: "Descriptive Link Text",
        category: Cognitive,
        importance: "Meaningful link text helps seniors understand where links will take them. Generic text like \"Read more\" creates uncertainty.",
        why: "Descriptive links reduce confusion and help seniors navigate with confidence, understanding the purpose of each link.",
        recommendation: "Link text should make sense out of context. Instead of a \"click here\" link, phrase it as \"Read more about our senior services\".",
    },
    "label" => AuditInfo {
        title: "Form Field Labels",
        category: Cognitive,
        importance: "Clear form labels are essential for seniors who may have difficulty understanding form purposes. Missing labels create confusion.",
        why: "Proper labels help seniors complete forms successfully, reducing frustration and abandonment of important tasks.",
        recommendation: "Every form input should have a clearly visible and programmatically associated <label> tag. Place labels above the input field for clarity.",
    },
    "largest-contentful-paint" => AuditInfo {
        title: "Page Loading Speed",
        category: Performance,
        importance: "Slow-loading pages can confuse seniors who may think the site is broken. Fast loading builds confidence.",
        why: "Seniors may have less patience for slow technology and may abandon sites that don't load quickly.",
        recommendation: "Optimize images, use a content delivery network (CDN), and minimize render-blocking scripts to ensure the main content loads in under 2.5 seconds.",
    },
    "cumulative-layout-shift" => AuditInfo {
        title: "Stable Page Layout",
        category: Performance,
        importance: "Pages that shift unexpectedly can confuse seniors and cause them to click wrong elements. Stable layouts provide predictable experiences.",
        why: "Layout stability is crucial for seniors who need consistent, predictable interfaces.",
        recommendation: "Specify dimensions for all images and ads to prevent content from shifting as it loads. Avoid inserting new content above existing content.",
    },
    "total-blocking-time" => AuditInfo {
        title: "Page Responsiveness",
        category: Performance,
        importance: "Unresponsive pages frustrate seniors who may interpret delays as system failures. Quick responsiveness builds trust.",
        why: "Seniors need immediate feedback from interactions to feel confident that their actions are being processed.",
        recommendation: "Break up long-running JavaScript tasks and minimize main-thread work to ensure the page responds to user input (like clicks) quickly.",
    },
    "is-on-https" => AuditInfo {
        title: "Secure Connection Protection",
        category: Security,
        importance: "HTTPS is crucial for protecting seniors who are often targets of online scams. It protects sensitive information from interception.",
        why: "Seniors are frequently targeted by cybercriminals. Secure connections provide essential protection for their personal and financial information.",
        recommendation: "The website should use a secure (HTTPS) connection on all pages to protect user data and build trust. This is indicated by a padlock icon in the browser's address bar.",
    },
    "geolocation-on-start" => AuditInfo {
        title: "Privacy-Respecting Location Requests",
        category: Security,
        importance: "Unexpected location requests can alarm seniors who may not understand why a website needs their location. Clear explanations build trust.",
        why: "Seniors value privacy and may be suspicious of unexpected requests for personal information.",
        recommendation: "Only request the user's location in response to a direct user action (e.g., clicking a \"Find stores near me\" button). Never ask on page load.",
    },
    "viewport" => AuditInfo {
        title: "Mobile-Friendly Design",
        category: Technical,
        importance: "Proper viewport configuration ensures content displays correctly on all devices, which is vital as many seniors use tablets or phones.",
        why: "Responsive design helps seniors access content on their preferred devices without text being too small or requiring horizontal scrolling.",
        recommendation: "Include the `<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">` tag in the `<head>` of all pages to ensure proper rendering on mobile devices.",
    },
    "dom-size" => AuditInfo {
        title: "Page Complexity Management",
        category: Technical,
        importance: "Overly complex pages can slow down assistive technologies and confuse seniors. Simpler pages load faster and are easier to navigate.",
        why: "Seniors benefit from simpler, more focused page designs that don't overwhelm them with too many choices.",
        recommendation: "Keep the number of DOM elements on a page below 1,500. Simplify the page structure where possible to improve performance and reduce complexity.",
    },
    "errors-in-console" => AuditInfo {
        title: "Technical Stability",
        category: Technical,
        importance: "JavaScript errors can break website functionality in unexpected ways, particularly affecting assistive technologies that seniors may rely on.",
        why: "Elderly users often depend on assistive technologies, and technical errors can make websites completely unusable for them.",
        recommendation: "Regularly check the browser's developer console for errors and fix them promptly to ensure a stable and reliable experience for all users.",
    },
};

/// 快速扫描报告的检查项（有序）
pub static LITE_AUDIT_INFO: &[LiteAuditInfo] = &[
    LiteAuditInfo { id: "color-contrast", title: "Color Contrast", impact: "Essential for seniors with vision changes to read text clearly." },
    LiteAuditInfo { id: "target-size", title: "Touch Target Size", impact: "Larger buttons help seniors with tremors or arthritis." },
    LiteAuditInfo { id: "font-size", title: "Font Size", impact: "Larger fonts are crucial for seniors with presbyopia." },
    LiteAuditInfo { id: "viewport", title: "Mobile Design", impact: "Proper mobile display for seniors using tablets/phones." },
    LiteAuditInfo { id: "link-name", title: "Link Text", impact: "Clear link descriptions help seniors navigate confidently." },
    LiteAuditInfo { id: "button-name", title: "Button Labels", impact: "Descriptive button text prevents confusion for seniors." },
    LiteAuditInfo { id: "label", title: "Form Labels", impact: "Clear form labels help seniors complete tasks successfully." },
    LiteAuditInfo { id: "heading-order", title: "Content Structure", impact: "Logical headings reduce cognitive load for seniors." },
    LiteAuditInfo { id: "is-on-https", title: "Security", impact: "Secure connections protect seniors from online scams." },
    LiteAuditInfo { id: "largest-contentful-paint", title: "Loading Speed", impact: "Fast loading prevents seniors from thinking site is broken." },
    LiteAuditInfo { id: "cumulative-layout-shift", title: "Stable Layout", impact: "Stable pages prevent seniors from clicking wrong elements." },
];

/// 快速扫描报告"高级版功能"页的内容
pub static PREMIUM_ADDITIONAL_AUDITS: &[&str] = &[
    "Text Size and Readability Analysis - In-depth font analysis",
    "Interactive Elements Visual Clarity - Color-only navigation detection",
    "Text Spacing Flexibility - Layout brittleness testing",
    "Page Responsiveness - JavaScript blocking analysis",
    "Privacy-Respecting Location Requests - Geolocation audit",
    "Page Complexity Management - DOM size optimization",
    "Technical Stability - Console error detection",
];

pub static PREMIUM_VISUAL_FEATURES: &[&str] = &[
    "Visual highlighting of problem areas on your website",
    "Before/after comparison screenshots",
    "Color contrast heatmaps",
    "Interactive element visualization",
    "Font size analysis overlays",
];

pub static PREMIUM_DETAILED_ANALYSIS: &[&str] = &[
    "Comprehensive explanations of why each issue matters for seniors",
    "Specific code recommendations and fixes",
    "Detailed impact assessments for each accessibility barrier",
    "Step-by-step improvement guides",
    "Technical implementation details",
];

pub fn audit_info(id: &str) -> Option<&'static AuditInfo> {
    AUDIT_INFO.get(id)
}

/// 审计标题，未收录的审计直接用 ID
pub fn audit_title(id: &str) -> &str {
    audit_info(id).map(|info| info.title).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scoring::{CategoryRegistry, SENIOR_FRIENDLY, SENIOR_FRIENDLY_LITE};

    #[test]
    fn test_every_weighted_audit_has_info() {
        let registry = CategoryRegistry::builtin();
        for category in [SENIOR_FRIENDLY, SENIOR_FRIENDLY_LITE] {
            for audit_ref in &registry.get(category).unwrap().audit_refs {
                assert!(audit_info(&audit_ref.id).is_some(), "missing {}", audit_ref.id);
            }
        }
    }

    #[test]
    fn test_lite_info_matches_lite_category() {
        let registry = CategoryRegistry::builtin();
        let lite = registry.get(SENIOR_FRIENDLY_LITE).unwrap();
        let ids: Vec<_> = LITE_AUDIT_INFO.iter().map(|i| i.id).collect();
        let refs: Vec<_> = lite.audit_refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, refs);
    }
}
