/// Escapes the characters HTML reserves, appending the result to `output`.
pub fn escape_html_into(input: &str, output: &mut String) {
    output.reserve(input.len());
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(c),
        }
    }
}

pub fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    escape_html_into(input, &mut output);
    output
}
