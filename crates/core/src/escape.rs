/// 将 Tailwind 类名转换为 CSS 选择器中的写法
///
/// `[A-Za-z0-9_-]` 原样保留，其余字符（`:` `/` `[` `]` `(` `)` `%` `#` `.` 等）
/// 前面加一个反斜杠。
///
/// - `"flex"` → `"flex"`
/// - `"md:flex"` → `"md\:flex"`
/// - `"w-[100px]"` → `"w-\[100px\]"`
pub fn escape_class(class: &str) -> String {
    let mut out = String::with_capacity(class.len() + 4);
    for ch in class.chars() {
        if !is_plain(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// 完整的类选择器：`.` + 转义后的类名
pub fn class_selector(class: &str) -> String {
    format!(".{}", escape_class(class))
}

fn is_plain(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}
