//! Command-block extraction from free-text model output.
//!
//! A block opens at a ```` ``` ```` or ```` ```bash ```` that ends its line,
//! even when prose precedes it on that line, and closes at the next line
//! starting with ```` ``` ````. Fences tagged with another language are
//! skipped whole.

use serde::{Deserialize, Serialize};

/// One fenced region of model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBlock {
    /// Text between the fences, as the model wrote it
    pub raw: String,

    /// Trimmed lines of `raw`, without blanks and `#` comments
    pub commands: Vec<String>,
}

impl CommandBlock {
    fn from_lines(lines: &[&str]) -> Self {
        let commands = lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();

        Self {
            raw: lines.join("\n"),
            commands,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fence {
    Outside,
    /// Inside a shell fence; holds the index of its first body line.
    Shell(usize),
    Foreign,
}

/// State after a line seen outside any fence, judged by the fence ending it.
fn opening(line: &str, body_start: usize) -> Fence {
    let line = line.trim_end();
    let Some(idx) = line.rfind("```") else {
        return Fence::Outside;
    };
    match &line[idx + 3..] {
        "" | "bash" => Fence::Shell(body_start),
        tag if !tag.contains(char::is_whitespace) => Fence::Foreign,
        _ => Fence::Outside,
    }
}

fn is_closing(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Extract every shell command block in document order.
///
/// Blocks whose body holds nothing runnable are dropped, as is a fence that
/// is never closed.
pub fn extract_command_blocks(text: &str) -> Vec<CommandBlock> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut state = Fence::Outside;

    for (i, line) in lines.iter().enumerate() {
        state = match state {
            Fence::Outside => opening(line, i + 1),
            // A tagged fence line never becomes body text.
            Fence::Shell(start) if is_closing(line) => {
                let block = CommandBlock::from_lines(&lines[start..i]);
                if !block.commands.is_empty() {
                    blocks.push(block);
                }
                Fence::Outside
            }
            Fence::Foreign if is_closing(line) => Fence::Outside,
            other => other,
        };
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bash_block() {
        let text = "Let me look around.\n```bash\nls -la\n```\nThen we'll see.";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw, "ls -la");
        assert_eq!(blocks[0].commands, vec!["ls -la"]);
    }

    #[test]
    fn untagged_fence_counts() {
        let blocks = extract_command_blocks("```\nwhoami\n```");
        assert_eq!(blocks[0].commands, vec!["whoami"]);
    }

    #[test]
    fn no_fence_no_blocks() {
        assert!(extract_command_blocks("The task is done.").is_empty());
        assert!(extract_command_blocks("").is_empty());
    }

    #[test]
    fn comments_and_blank_lines_dropped() {
        let text = "```bash\n# scan first\n\n  nmap -sV host  \n# then\ncurl host\n```";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks[0].commands, vec!["nmap -sV host", "curl host"]);
        assert!(blocks[0].raw.contains("# scan first"));
    }

    #[test]
    fn blocks_in_document_order() {
        let text = "```bash\necho one\n```\ntext\n```\necho two\necho three\n```";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].commands, vec!["echo one"]);
        assert_eq!(blocks[1].commands, vec!["echo two", "echo three"]);
    }

    #[test]
    fn other_languages_are_skipped_whole() {
        let text = "```python\nprint('hi')\n```\n```bash\nid\n```";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].commands, vec!["id"]);
    }

    #[test]
    fn unterminated_fence_yields_nothing() {
        assert!(extract_command_blocks("```bash\nls -la\n").is_empty());
    }

    #[test]
    fn comment_only_block_is_dropped() {
        assert!(extract_command_blocks("```bash\n# nothing to do\n```").is_empty());
    }

    #[test]
    fn crlf_line_endings() {
        let blocks = extract_command_blocks("```bash\r\npwd\r\n```\r\n");
        assert_eq!(blocks[0].commands, vec!["pwd"]);
    }

    #[test]
    fn fence_opened_after_prose_on_the_same_line() {
        let text = "Run: ```bash\nls\n```\nThen check:\n```bash\nid\n```";
        let commands: Vec<Vec<String>> = extract_command_blocks(text).into_iter().map(|b| b.commands).collect();
        assert_eq!(commands, vec![vec!["ls"], vec!["id"]]);
    }

    #[test]
    fn inline_foreign_fence_is_skipped() {
        let text = "Example: ```python\nprint('x')\n```\n```bash\nuname -a\n```";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].commands, vec!["uname -a"]);
    }

    #[test]
    fn tagged_fence_line_closes_a_shell_block() {
        let text = "```bash\nls\n```python\nprint('x')\n```";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].commands, vec!["ls"]);
        assert_eq!(blocks[0].raw, "ls");
    }

    #[test]
    fn inline_code_spans_do_not_open_fences() {
        let text = "Use ```ls``` carefully, or `pwd`.\nNothing else to run.";
        assert!(extract_command_blocks(text).is_empty());
    }

    #[test]
    fn reparsing_an_extracted_block_is_stable() {
        let text = "Try:\n```bash\n# enumerate\nls -la /etc\n\ncat /etc/hosts\n```";
        let first = extract_command_blocks(text);
        let refenced = format!("```bash\n{}\n```", first[0].commands.join("\n"));
        let second = extract_command_blocks(&refenced);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].commands, first[0].commands);

        let from_raw = extract_command_blocks(&format!("```bash\n{}\n```", first[0].raw));
        assert_eq!(from_raw, first);
    }
}
