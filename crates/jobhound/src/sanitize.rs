//! Helpers for sanitizing untrusted text before it enters prompts or
//! outbound messages.
//!
//! Scraped post text is attacker-controlled: these functions neutralize
//! chat-template control tokens so a crafted post cannot break out of its
//! prompt slot, and truncate on char boundaries so multi-byte text never
//! panics a byte slice.

/// Neutralizes chat-template control sequences in untrusted text.
///
/// Post text goes straight into LLM prompts; a post containing `<|im_end|>`
/// or instruction markers could otherwise terminate the user turn early.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}

/// Truncates to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
