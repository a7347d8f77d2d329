//! CMake 脚本文本输出：缩进、引号判定、条件块、命令和列表。

use regex::Regex;
use std::sync::LazyLock;

/// 空白前面是非空白、非 `}` 字符
static WS_AFTER_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\s}]\s").expect("quoting pattern is valid"));
/// 空白后面是非空白、非 `$` 字符
static WS_BEFORE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s[^\s$]").expect("quoting pattern is valid"));

const INDENT: &str = "  ";
/// 单行命令超过这个长度时改为每个参数一行
const MAX_LINE: usize = 100;

/// 字符串是否需要加引号。
///
/// 只在空白紧挨着普通文本时才需要；`${A} ${B}` 这种变量引用之间的空白不算。
pub fn needs_quoting(s: &str) -> bool {
    s.is_empty() || WS_AFTER_TEXT.is_match(s) || WS_BEFORE_TEXT.is_match(s)
}

pub fn has_quotes(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

/// `"a;b"` 形式的列表字面量，去掉引号会改变含义
fn is_list_literal(s: &str) -> bool {
    has_quotes(s) && s.contains(';')
}

/// 按需加引号或去引号。已带引号的内容只有在确实不需要引号且不是列表字面量时才去掉。
pub fn quote_if_needed(s: &str) -> String {
    let quoted = has_quotes(s);
    let inner = if quoted { &s[1..s.len() - 1] } else { s };
    let needs = needs_quoting(inner);

    if needs && !quoted {
        format!("\"{}\"", s)
    } else if quoted && !needs && !is_list_literal(s) {
        inner.to_string()
    } else {
        s.to_string()
    }
}

/// 带缩进的 CMake 文本输出器
#[derive(Debug, Default)]
pub struct CMakeWriter {
    out: String,
    indent: usize,
}

impl CMakeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indent_level(&self) -> usize {
        self.indent
    }

    pub fn into_string(self) -> String {
        self.out
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn write_line(&mut self, line: &str) {
        if line.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    pub fn write_empty_line(&mut self) {
        self.out.push('\n');
    }

    pub fn write_comment(&mut self, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.write_line("#");
            } else {
                self.write_line(&format!("# {}", line));
            }
        }
    }

    /// 输出命令，参数逐个经过引号判定
    pub fn write_command(&mut self, name: &str, args: &[&str]) {
        let args: Vec<String> = args.iter().map(|a| quote_if_needed(a)).collect();
        self.write_command_raw(name, &args);
    }

    /// 参数原样输出（调用方已处理引号）
    pub fn write_command_raw(&mut self, name: &str, args: &[String]) {
        let single = format!("{}({})", name, args.join(" "));
        if single.len() + self.indent * INDENT.len() <= MAX_LINE || args.len() < 2 {
            self.write_line(&single);
            return;
        }
        self.write_line(&format!("{}(", name));
        self.indent += 1;
        for arg in args {
            self.write_line(arg);
        }
        self.indent -= 1;
        self.write_line(")");
    }

    /// 命令头部参数后跟一个列表（列表为空时不输出）
    pub fn write_command_list(&mut self, name: &str, head: &[&str], items: &[String]) {
        if items.is_empty() {
            return;
        }
        let mut args: Vec<String> = head.iter().map(|a| quote_if_needed(a)).collect();
        args.extend(items.iter().map(|i| quote_if_needed(i)));
        self.write_command_raw(name, &args);
    }

    pub fn write_set_var(&mut self, var: &str, value: &str) {
        self.write_command("set", &[var, value]);
    }

    pub fn write_set_list(&mut self, var: &str, items: &[String]) {
        self.write_command_list("set", &[var], items);
    }

    pub fn write_include(&mut self, file: &str, optional: bool) {
        if optional {
            self.write_command("include", &[file, "OPTIONAL"]);
        } else {
            self.write_command("include", &[file]);
        }
    }

    /// `set_property(TARGET t APPEND PROPERTY P v...)`
    pub fn write_property_append(&mut self, target: &str, property: &str, values: &[String]) {
        self.write_command_list(
            "set_property",
            &["TARGET", target, "APPEND", "PROPERTY", property],
            values,
        );
    }

    pub fn write_property_set(&mut self, target: &str, property: &str, value: &str) {
        self.write_command("set_property", &["TARGET", target, "PROPERTY", property, value]);
    }

    /// 条件为 None 时什么都不做，调用方可以统一包裹而不必区分平台
    pub fn write_conditional_if(&mut self, condition: Option<&str>) {
        if let Some(condition) = condition {
            self.write_line(&format!("if({})", condition));
            self.indent += 1;
        }
    }

    pub fn write_conditional_else(&mut self, condition: Option<&str>) {
        if condition.is_some() {
            self.indent = self.indent.saturating_sub(1);
            self.write_line("else()");
            self.indent += 1;
        }
    }

    pub fn write_conditional_end(&mut self, condition: Option<&str>) {
        if condition.is_some() {
            self.indent = self.indent.saturating_sub(1);
            self.write_line("endif()");
        }
    }

    /// 在条件块中执行 body
    pub fn with_conditional<F>(&mut self, condition: Option<&str>, body: F)
    where
        F: FnOnce(&mut Self),
    {
        self.write_conditional_if(condition);
        body(self);
        self.write_conditional_end(condition);
    }
}
