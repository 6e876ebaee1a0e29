use std::collections::BTreeMap;
use std::fmt::Write as _;

use dstask_core::Task;

/// Sort open tasks by priority, then by id.
pub fn sort_open(tasks: &mut [&Task]) {
    tasks.sort_by_key(|task| (task.priority, task.ephemeral_id));
}

/// Sort resolved tasks by resolution time, oldest first.
pub fn sort_resolved(tasks: &mut [&Task]) {
    tasks.sort_by_key(|task| (task.resolved_at, task.created_at));
}

/// Plain table of addressable tasks.
pub fn task_table(tasks: &[&Task]) -> String {
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|task| {
            vec![
                task.ephemeral_id.map(|id| id.to_string()).unwrap_or_default(),
                task.priority.to_string(),
                task.status.to_string(),
                task.tags.iter().map(|tag| format!("+{tag}")).collect::<Vec<_>>().join(" "),
                task.project.clone().unwrap_or_default(),
                task.summary.clone(),
            ]
        })
        .collect();
    table(&["ID", "Pri", "Status", "Tags", "Project", "Summary"], &rows)
}

/// Plain table of resolved tasks.
pub fn resolved_table(tasks: &[&Task]) -> String {
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|task| {
            vec![
                task.resolved_at
                    .map(|at| at.date().to_string())
                    .unwrap_or_default(),
                task.project.clone().unwrap_or_default(),
                task.summary.clone(),
            ]
        })
        .collect();
    table(&["Resolved", "Project", "Summary"], &rows)
}

/// Open and resolved counts per project.
pub fn projects_table(projects: &BTreeMap<String, (usize, usize)>) -> String {
    let rows: Vec<Vec<String>> = projects
        .iter()
        .map(|(name, (open, resolved))| vec![name.clone(), open.to_string(), resolved.to_string()])
        .collect();
    table(&["Project", "Open", "Resolved"], &rows)
}

fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|cell| cell.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = header.iter().map(|cell| (*cell).to_owned()).collect();
    for row in std::iter::once(&header).chain(rows) {
        let mut line = String::new();
        for (index, (cell, width)) in row.iter().zip(&widths).enumerate() {
            if index + 1 == row.len() {
                line.push_str(cell);
            } else {
                let _ = write!(line, "{cell:<width$}  ");
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
