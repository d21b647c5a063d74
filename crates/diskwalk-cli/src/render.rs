//! Box-drawing tree output.

use diskwalk_core::{TreeEvent, TreeRenderer};
use std::io::{self, Write};

const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

pub struct TextRenderer<W> {
    out: W,
    color: bool,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TreeRenderer for TextRenderer<W> {
    fn line(&mut self, guides: &[bool], event: &TreeEvent) -> io::Result<()> {
        for &open in guides {
            self.out.write_all(if open { "│   " } else { "    " }.as_bytes())?;
        }
        let branch = if event.is_last { "└── " } else { "├── " };
        if self.color && event.is_dir {
            writeln!(self.out, "{branch}{BLUE}{}{RESET}", event.name)
        } else {
            writeln!(self.out, "{branch}{}", event.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diskwalk_core::{render_tree, NodeRef};

    fn event(name: &str, depth: usize, is_last: bool, is_dir: bool) -> diskwalk_core::Result<TreeEvent> {
        Ok(TreeEvent {
            name: name.into(),
            raw_name: name.as_bytes().to_vec(),
            depth,
            is_last,
            is_dir,
            node: NodeRef::Ext2 { inode: 12 },
        })
    }

    fn render(events: Vec<diskwalk_core::Result<TreeEvent>>, color: bool) -> String {
        let mut renderer = TextRenderer::new(Vec::new(), color);
        render_tree(events, &mut renderer).unwrap();
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn draws_guides_for_open_ancestors() {
        let text = render(
            vec![
                event("docs", 0, false, true),
                event("a.txt", 1, true, false),
                event("top.txt", 0, true, false),
            ],
            false,
        );
        assert_eq!(text, "├── docs\n│   └── a.txt\n└── top.txt\n");
    }

    #[test]
    fn closed_ancestors_leave_blank_columns() {
        let text = render(
            vec![event("only", 0, true, true), event("inner", 1, true, false)],
            false,
        );
        assert_eq!(text, "└── only\n    └── inner\n");
    }

    #[test]
    fn directories_are_blue_when_colored() {
        let text = render(
            vec![event("dir", 0, false, true), event("file", 0, true, false)],
            true,
        );
        assert_eq!(text, "├── \x1b[34mdir\x1b[0m\n└── file\n");
    }
}
