//! Terminal rendering of policy and value grids.

use colored::{ColoredString, Colorize};
use gridnav_planning::{PolicyMap, ValueMap};
use gridnav_types::{Cell, PolicyLabel};

/// Column width of one cell; wide enough for `GOAL`.
const CELL_WIDTH: usize = 5;

fn paint(label: PolicyLabel) -> ColoredString {
    let text = format!("{:<width$}", label.to_string(), width = CELL_WIDTH);
    match label {
        PolicyLabel::Move(_) => text.cyan().bold(),
        PolicyLabel::Goal => text.green().bold(),
        PolicyLabel::Pit => text.red(),
        PolicyLabel::Wall => text.dimmed(),
    }
}

/// One line per grid row, labels left-aligned in fixed-width columns.
pub fn policy_grid(policy: &PolicyMap) -> String {
    policy
        .rows_iter()
        .map(|row| {
            row.iter()
                .map(|label| paint(*label).to_string())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// State values with two decimals, terminal cells shown by their tag.
pub fn value_grid(policy: &PolicyMap, values: &ValueMap) -> String {
    (0..policy.rows())
        .map(|row| {
            (0..policy.cols())
                .map(|col| {
                    let cell = Cell::new(row, col);
                    match policy.get(cell) {
                        Some(PolicyLabel::Move(_)) => {
                            format!("{:>8.2}", values.get(cell).unwrap_or(0.0))
                        }
                        Some(label) => format!("{:>8}", label.to_string()).dimmed().to_string(),
                        None => String::new(),
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use gridnav_planning::ValueIteration;
    use gridnav_types::{GridConfig, GridModel};

    use super::*;

    fn solved() -> gridnav_planning::Solution {
        let config = GridConfig::default();
        let grid = GridModel::from_config(&config).unwrap();
        ValueIteration::from_config(&grid, &config)
            .unwrap()
            .solve_with_values()
    }

    #[test]
    fn policy_grid_has_one_line_per_row() {
        colored::control::set_override(false);
        let solution = solved();

        let rendered = policy_grid(&solution.policy);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "E    E    E    GOAL");
        assert!(lines[1].contains("WALL"));
        assert!(lines[1].ends_with("PIT"));
    }

    #[test]
    fn value_grid_tags_terminal_cells() {
        colored::control::set_override(false);
        let solution = solved();

        let rendered = value_grid(&solution.policy, &solution.values);
        let first = rendered.lines().next().unwrap();

        assert!(first.trim_end().ends_with("GOAL"));
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains('.'));
    }
}
