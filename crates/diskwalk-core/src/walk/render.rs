//! Drives a presentation layer from a stream of tree events.

use super::TreeEvent;
use crate::error::Result;
use std::io;

/// Receives one call per tree line.
///
/// `guides[i]` is `true` while the ancestor at depth `i` still has siblings
/// to come, i.e. a continuation bar belongs in that column.
pub trait TreeRenderer {
    fn line(&mut self, guides: &[bool], event: &TreeEvent) -> io::Result<()>;
}

/// Feed every event to `renderer`, returning the number of lines rendered.
///
/// The guide stack lives for exactly one call, so consecutive walks never
/// see each other's state.
pub fn render_tree<I, R>(events: I, renderer: &mut R) -> Result<usize>
where
    I: IntoIterator<Item = Result<TreeEvent>>,
    R: TreeRenderer + ?Sized,
{
    let mut guides: Vec<bool> = Vec::new();
    let mut lines = 0;
    for event in events {
        let event = event?;
        guides.resize(event.depth, false);
        renderer.line(&guides, &event)?;
        guides.push(!event.is_last);
        lines += 1;
    }
    Ok(lines)
}
