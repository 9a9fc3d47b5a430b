//! Collapse bursts of scrub updates.
//!
//! A drag gesture can enqueue many `Scrub` commands between two iterations of
//! the control loop; only the last of each consecutive run matters.

use super::types::ControlCmd;

pub(crate) fn coalesce_scrubs(batch: Vec<ControlCmd>) -> Vec<ControlCmd> {
    let mut out: Vec<ControlCmd> = Vec::with_capacity(batch.len());
    for cmd in batch {
        let supersedes = matches!(cmd, ControlCmd::Scrub(_))
            && matches!(out.last(), Some(ControlCmd::Scrub(_)));
        if supersedes {
            out.pop();
        }
        out.push(cmd);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(cmds: &[ControlCmd]) -> Vec<String> {
        cmds.iter()
            .map(|c| match c {
                ControlCmd::BeginScrub(p) => format!("begin {p}"),
                ControlCmd::Scrub(p) => format!("scrub {p}"),
                ControlCmd::EndScrub(p) => format!("end {p}"),
                ControlCmd::TogglePlay => "toggle".to_string(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[test]
    fn keeps_only_the_latest_scrub_of_a_run() {
        let batch = vec![
            ControlCmd::BeginScrub(0.1),
            ControlCmd::Scrub(0.2),
            ControlCmd::Scrub(0.3),
            ControlCmd::Scrub(0.4),
            ControlCmd::EndScrub(0.4),
        ];
        assert_eq!(
            shape(&coalesce_scrubs(batch)),
            vec!["begin 0.1", "scrub 0.4", "end 0.4"]
        );
    }

    #[test]
    fn does_not_merge_across_other_commands() {
        let batch = vec![
            ControlCmd::Scrub(0.2),
            ControlCmd::TogglePlay,
            ControlCmd::Scrub(0.3),
        ];
        assert_eq!(
            shape(&coalesce_scrubs(batch)),
            vec!["scrub 0.2", "toggle", "scrub 0.3"]
        );
    }

    #[test]
    fn empty_batch_stays_empty() {
        assert!(coalesce_scrubs(Vec::new()).is_empty());
    }
}
