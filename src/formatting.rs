/// Leaves headroom under common 2000-character chat message limits.
pub const DEFAULT_SPLIT_LENGTH: usize = 1900;

const ELLIPSIS: &str = "...";

/// `GROUP - NEWS SUMMARY` over a `=` rule of the same width.
pub fn digest_header(group_name: &str) -> String {
    let header = format!("{} - NEWS SUMMARY", group_name.to_uppercase());
    let rule = "=".repeat(header.chars().count());
    format!("{}\n{}", header, rule)
}

/// Splits `content` on line boundaries into chunks of at most `max_length`
/// characters. A single line longer than the limit is cut and marked with `...`.
pub fn split_message(content: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(ELLIPSIS.len() + 1);
    if content.chars().count() <= max_length {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in content.split('\n') {
        let mut line_len = line.chars().count();

        if current_len + line_len + 1 > max_length && current_len > 0 {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len == 0 && current_len == 0 {
            continue;
        }

        let line = if line_len > max_length {
            let keep = max_length - ELLIPSIS.len();
            line_len = max_length;
            let cut: String = line.chars().take(keep).collect();
            format!("{}{}", cut, ELLIPSIS)
        } else {
            line.to_string()
        };

        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&line);
        current_len += line_len;
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}
