use crate::models::ReportResult;
use std::io::Write;

const TAB_WIDTH: usize = 8;
const PADDING: usize = 1;

/// Tab-separated lines for a report: the header (unless suppressed) followed
/// by one line per row.
pub fn report_lines(result: &ReportResult, no_header: bool) -> Vec<String> {
    let header = (!no_header).then(|| {
        result
            .headers
            .iter()
            .map(|h| h.title())
            .collect::<Vec<_>>()
            .join("\t")
    });

    header
        .into_iter()
        .chain(result.rows.iter().map(|row| row.join("\t")))
        .collect()
}

/// Write the report to `out`, padding columns with tabs so they line up.
pub fn render<W: Write>(
    out: &mut W,
    result: &ReportResult,
    no_header: bool,
) -> std::io::Result<()> {
    let lines = report_lines(result, no_header);
    out.write_all(align(&lines).as_bytes())?;
    out.flush()
}

/// Align tab-separated lines on tab stops.
///
/// Every cell except the last one on a line is padded with tabs up to the
/// width of its column, rounded up to the next multiple of the tab width.
fn align(lines: &[String]) -> String {
    let cells: Vec<Vec<&str>> = lines.iter().map(|l| l.split('\t').collect()).collect();

    let mut widths: Vec<usize> = Vec::new();
    for line in &cells {
        let Some((_, leading)) = line.split_last() else {
            continue;
        };
        for (i, cell) in leading.iter().enumerate() {
            let width = cell.chars().count() + PADDING;
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(width),
                None => widths.push(width),
            }
        }
    }
    let widths: Vec<usize> = widths
        .into_iter()
        .map(|w| w.div_ceil(TAB_WIDTH) * TAB_WIDTH)
        .collect();

    let mut output = String::new();
    for line in &cells {
        if let Some((last, leading)) = line.split_last() {
            for (cell, width) in leading.iter().zip(&widths) {
                let gap = width - cell.chars().count();
                output.push_str(cell);
                output.push_str(&"\t".repeat(gap.div_ceil(TAB_WIDTH)));
            }
            output.push_str(last);
        }
        output.push('\n');
    }
    output
}
