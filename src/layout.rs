use crate::content::TargetScript;

/// Separator between rendered lines of a practice sheet
pub const LINE_SEPARATOR: &str = "\n\n";

/// Packs practice items into printable lines under a character budget
#[derive(Debug, Clone)]
pub struct LineFormatter {
    pub script: TargetScript,
    pub max_chars: usize,
    pub min_chars: usize,
}

impl Default for LineFormatter {
    fn default() -> Self {
        Self {
            script: TargetScript::CJK,
            max_chars: 10,
            min_chars: 5,
        }
    }
}

impl LineFormatter {
    pub fn new(script: TargetScript, max_chars: usize, min_chars: usize) -> Self {
        Self {
            script,
            max_chars,
            min_chars,
        }
    }

    /// Greedy packing. An item that would overflow the budget is still placed
    /// on the current line when that line is otherwise too short.
    pub fn format(&self, items: &[String]) -> Vec<String> {
        let items: Vec<&str> = items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        let lengths: Vec<usize> = items.iter().map(|s| self.script.count(s)).collect();

        let mut lines = Vec::new();
        let mut i = 0;
        while i < items.len() {
            let mut line: Vec<&str> = Vec::new();
            let mut length = 0;

            while i < items.len() {
                let next = length + lengths[i];
                if next <= self.max_chars {
                    line.push(items[i]);
                    length = next;
                    i += 1;
                } else {
                    if length <= self.min_chars {
                        line.push(items[i]);
                        i += 1;
                    }
                    break;
                }
            }

            lines.push(line.join(" "));
        }
        lines
    }

    /// Lines joined by a blank line, ready to print
    pub fn render(&self, items: &[String]) -> String {
        self.format(items).join(LINE_SEPARATOR)
    }
}
