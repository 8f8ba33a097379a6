//! Analysis prompt composition.

use crate::markup::{self, MARK_CLOSE, MARK_OPEN};

/// Compose the single user message sent to the chat-completion endpoint.
///
/// Asks for a per-topic breakdown, a cross-topic synthesis when more than
/// one topic is selected, and one or two discussion questions. The
/// formatting rules name the only emphasis markup allowed in stored
/// analyses and forbid Markdown bold.
pub fn build_prompt(title: &str, source_text: &str, topics: &[String]) -> String {
    let mut steps = vec![format!(
        "1. 分册解析：逐一说明素材在《{}》中对应的考点。",
        topics.join("》《")
    )];
    if topics.len() > 1 {
        steps.push("2. 跨教材联动：分析上述教材知识点之间的内在逻辑联系。".to_string());
    }
    steps.push(format!(
        "{}. 综合设问：给出 1-2 个高质量设问。",
        steps.len() + 1
    ));

    format!(
        "你是一位高中思想政治名师。请针对素材《{title}》进行教研分析，涉及教材：{topics}。\n\
         要求：\n{steps}\n\
         格式：严禁使用 ** 加粗；核心词包裹在 {open} {close} 中；\
         关键结论使用 {strong}。\n\
         素材：{source}",
        title = title,
        topics = topics.join("、"),
        steps = steps.join("\n"),
        open = MARK_OPEN,
        close = MARK_CLOSE,
        strong = markup::strong(" "),
        source = source_text,
    )
}
