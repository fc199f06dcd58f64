//! Text report rendering.
//!
//! The report is plain text with CRLF line endings and comma-separated
//! fields. Fields are not quoted; event names are validated to contain no
//! commas when the catalogue is built. [`ReportWriter`] holds no state
//! besides the text produced so far, so the same inputs always render the
//! same bytes.
//!
//! Real numbers use the shortest representation that round-trips, with a
//! trailing `.0` for integral values (`1.0`, `0.25`, `0.3333333333333333`).
//! Percentage columns hold fractions in `[0, 1]`.

use possums_types::{CumulativeResult, EventCatalog, StudentSequence, Tally};

use crate::error::SimulationError;
use crate::stats::{cross_run_summary, describe_students};

/// Line terminator used throughout the report.
pub const CRLF: &str = "\r\n";

/// Incremental builder for one report.
#[derive(Debug)]
pub struct ReportWriter<'a> {
    catalog: &'a EventCatalog,
    out: String,
}

impl<'a> ReportWriter<'a> {
    /// Start an empty report for the given catalogue.
    pub const fn new(catalog: &'a EventCatalog) -> Self {
        Self {
            catalog,
            out: String::new(),
        }
    }

    /// Append the single-run block for one sampling interval.
    ///
    /// `tallies` holds one tally per student; `real_counts` is the unsampled
    /// ground truth of the reference student.
    pub fn interval_block(&mut self, interval: u64, tallies: &[Tally], real_counts: &Tally) {
        self.interval_heading(interval);

        for i in 1..=tallies.len() {
            self.out
                .push_str(&format!(",tally student{i},percentage student{i}"));
        }
        self.out.push_str(
            ",,total tally, average tally, std tally, average percentage, std percentage",
        );
        self.out.push_str(",,target percentage");
        self.out.push_str(CRLF);

        for (id, event) in self.catalog.iter() {
            self.out.push_str(event.name());
            for tally in tallies {
                self.out.push_str(&format!(
                    ",{},{}",
                    tally.count(id),
                    format_real(tally.percentage(id))
                ));
            }
            let spread = describe_students(tallies, id);
            self.out.push_str(&format!(
                ",,,{},{},{},{},{},,{}",
                spread.total_tally,
                format_real(spread.mean_tally),
                format_real(spread.std_tally),
                format_real(spread.mean_percentage),
                format_real(spread.std_percentage),
                format_real(event.target_fraction()),
            ));
            self.out
                .push_str(&format!(",,{}", format_real(real_counts.percentage(id))));
            self.out.push_str(CRLF);
        }
        self.out.push_str(CRLF);
        self.out.push_str(CRLF);
    }

    /// Append the stationary distribution of the Markov model.
    pub fn steady_state(&mut self, distribution: &[f64]) {
        self.out.push_str("Steady state distribution");
        self.out.push_str(CRLF);
        for ((_, event), p) in self.catalog.iter().zip(distribution) {
            self.out
                .push_str(&format!("{},{}{CRLF}", event.name(), format_real(*p)));
        }
        self.out.push_str(CRLF);
    }

    /// Append the raw per-time-unit ledger of every student's events.
    ///
    /// Rows follow the first student's sequence; time is 1-based.
    pub fn ledger(&mut self, sequences: &[StudentSequence]) {
        self.out.push_str("Randomized events:");
        self.out.push_str(CRLF);
        self.out.push_str(CRLF);

        self.out.push_str("time");
        for i in 1..=sequences.len() {
            self.out.push_str(&format!(",student{i}"));
        }
        self.out.push_str(CRLF);

        let length = sequences.first().map_or(0, StudentSequence::len);
        for t in 0..length {
            self.out.push_str(&t.saturating_add(1).to_string());
            for seq in sequences {
                self.out.push(',');
                if let Some(id) = seq.get(t) {
                    self.out.push_str(self.catalog.name_of(id));
                }
            }
            self.out.push_str(CRLF);
        }
    }

    /// Append the cross-run summary and per-run ledger for one interval.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InsufficientRuns`] for fewer than 2 runs.
    pub fn cumulative_block(
        &mut self,
        interval: u64,
        cumulative: &CumulativeResult,
    ) -> Result<(), SimulationError> {
        self.interval_heading(interval);
        self.out.push_str(
            ",average tally,std tally,average percentage,std percentage,,target percentage",
        );
        self.out.push_str(CRLF);

        for (id, event) in self.catalog.iter() {
            let summary = cross_run_summary(cumulative, interval, id)?;
            self.out.push_str(&format!(
                "{},{},{},{},{},,{}{CRLF}",
                event.name(),
                format_real(summary.mean_tally),
                format_real(summary.std_tally),
                format_real(summary.mean_percentage),
                format_real(summary.std_percentage),
                format_real(event.target_fraction()),
            ));
        }
        self.out.push_str(CRLF);
        self.out.push_str(CRLF);

        self.out.push_str("Simulation#");
        for (_, event) in self.catalog.iter() {
            let name = event.name();
            self.out
                .push_str(&format!(",{name} tally,{name} percentage"));
        }
        self.out.push_str(CRLF);

        for (run_number, run) in (1_usize..).zip(cumulative.runs()) {
            self.out.push_str(&run_number.to_string());
            for id in self.catalog.ids() {
                let data = run.event(interval, id);
                let tally = data.map_or(0, |d| d.total_tally);
                let percentage = data
                    .and_then(|d| d.percentage)
                    .map(format_real)
                    .unwrap_or_default();
                self.out.push_str(&format!(",{tally},{percentage}"));
            }
            self.out.push_str(CRLF);
        }
        self.out.push_str(CRLF);
        Ok(())
    }

    /// Consume the writer and return the rendered text.
    pub fn finish(self) -> String {
        self.out
    }

    fn interval_heading(&mut self, interval: u64) {
        self.out
            .push_str(&format!("Time per observation = {interval}"));
        self.out.push_str(CRLF);
        self.out.push_str(CRLF);
    }
}

/// Render a real number in shortest round-trip form, keeping `.0` on
/// integral values.
///
/// Magnitudes below `1e-4` or from `1e16` up switch to exponent form with a
/// signed exponent of at least two digits (`5e-05`, `1.5e-07`, `1e+16`).
pub fn format_real(value: f64) -> String {
    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = exponent
                .strip_prefix('-')
                .map_or(("+", exponent), |digits| ("-", digits));
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

/// Event row of a single-run interval block, read back from text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEventRow {
    /// Event name (first column).
    pub name: String,
    /// `(tally, percentage)` per student, in student order.
    pub students: Vec<(u64, f64)>,
}

/// Parse the per-student columns of a single-run event row.
///
/// Accepts the row with or without its trailing CRLF. Returns `None` when
/// the row has fewer than `students` pairs or a field does not parse.
pub fn parse_event_row(row: &str, students: usize) -> Option<ParsedEventRow> {
    let mut fields = row.trim_end_matches(CRLF).split(',');
    let name = fields.next()?.to_owned();

    let mut pairs = Vec::with_capacity(students);
    for _ in 0..students {
        let tally = fields.next()?.parse().ok()?;
        let percentage = fields.next()?.parse().ok()?;
        pairs.push((tally, percentage));
    }

    Some(ParsedEventRow {
        name,
        students: pairs,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use possums_types::{ClassRunEventData, Event, EventId, EventResults, RunRecord};

    use super::*;

    fn catalog() -> EventCatalog {
        EventCatalog::new(vec![
            Event::new("on task", 1, 75.0).unwrap(),
            Event::new("off task", 1, 25.0).unwrap(),
        ])
        .unwrap()
    }

    fn tally(catalog: &EventCatalog, on: u64, off: u64) -> Tally {
        let mut t = Tally::new(catalog);
        (0..on).for_each(|_| t.increment(EventId(0)));
        (0..off).for_each(|_| t.increment(EventId(1)));
        t
    }

    fn run(interval: u64, on: (u64, Option<f64>), off: (u64, Option<f64>)) -> RunRecord {
        let mut results = EventResults::new();
        results.insert(
            EventId(0),
            ClassRunEventData {
                total_tally: on.0,
                percentage: on.1,
            },
        );
        results.insert(
            EventId(1),
            ClassRunEventData {
                total_tally: off.0,
                percentage: off.1,
            },
        );
        let mut record = RunRecord::new();
        record.insert(interval, results);
        record
    }

    #[test]
    fn real_numbers_keep_trailing_zero() {
        assert_eq!(format_real(1.0), "1.0");
        assert_eq!(format_real(0.0), "0.0");
        assert_eq!(format_real(0.25), "0.25");
        assert_eq!(format_real(1.0 / 3.0), "0.3333333333333333");
    }

    #[test]
    fn tiny_and_huge_reals_use_padded_exponent() {
        assert_eq!(format_real(0.0001), "0.0001");
        assert_eq!(format_real(5e-5), "5e-05");
        assert_eq!(format_real(1e-7), "1e-07");
        assert_eq!(format_real(1.5e-7), "1.5e-07");
        assert_eq!(format_real(2.5e-120), "2.5e-120");
        assert_eq!(format_real(1e16), "1e+16");
    }

    #[test]
    fn single_run_interval_block_layout() {
        let catalog = catalog();
        let tallies = vec![tally(&catalog, 3, 1), tally(&catalog, 1, 1)];
        let real = tally(&catalog, 6, 2);
        let mut writer = ReportWriter::new(&catalog);
        writer.interval_block(5, &tallies, &real);
        let text = writer.finish();

        let expected = concat!(
            "Time per observation = 5\r\n\r\n",
            ",tally student1,percentage student1,tally student2,percentage student2",
            ",,total tally, average tally, std tally, average percentage, std percentage",
            ",,target percentage\r\n",
            "on task,3,0.75,1,0.5,,,4,2.0,1.4142135623730951,0.625,0.125,,0.75,,0.75\r\n",
            "off task,1,0.25,1,0.5,,,2,1.0,0.0,0.375,0.125,,0.25,,0.25\r\n",
            "\r\n\r\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn student_without_samples_renders_zero_share() {
        let catalog = catalog();
        let tallies = vec![tally(&catalog, 0, 0)];
        let mut writer = ReportWriter::new(&catalog);
        writer.interval_block(1, &tallies, &tally(&catalog, 0, 0));
        let text = writer.finish();
        assert!(text.contains("on task,0,0.0,,,0,0.0,0.0,0.0,0.0,,0.75,,0.0\r\n"));
    }

    #[test]
    fn event_rows_parse_back() {
        let catalog = catalog();
        let tallies = vec![tally(&catalog, 3, 1), tally(&catalog, 2, 5), tally(&catalog, 0, 0)];
        let mut writer = ReportWriter::new(&catalog);
        writer.interval_block(2, &tallies, &tally(&catalog, 1, 1));
        let text = writer.finish();

        let rows: Vec<&str> = text.split(CRLF).skip(3).take(2).collect();
        for ((id, event), row) in catalog.iter().zip(rows) {
            let parsed = parse_event_row(row, tallies.len()).unwrap();
            assert_eq!(parsed.name, event.name());
            let expected: Vec<(u64, f64)> = tallies
                .iter()
                .map(|t| (t.count(id), t.percentage(id)))
                .collect();
            assert_eq!(parsed.students, expected);
        }
        assert!(parse_event_row("on task,1", 1).is_none());
    }

    #[test]
    fn steady_state_and_ledger() {
        let catalog = catalog();
        let sequences = vec![
            StudentSequence::new(vec![EventId(0), EventId(1)], 2),
            StudentSequence::new(vec![EventId(1), EventId(1)], 2),
        ];
        let mut writer = ReportWriter::new(&catalog);
        writer.steady_state(&[0.5, 0.5]);
        writer.ledger(&sequences);
        assert_eq!(
            writer.finish(),
            concat!(
                "Steady state distribution\r\n",
                "on task,0.5\r\n",
                "off task,0.5\r\n",
                "\r\n",
                "Randomized events:\r\n\r\n",
                "time,student1,student2\r\n",
                "1,on task,off task\r\n",
                "2,off task,off task\r\n",
            )
        );
    }

    #[test]
    fn cumulative_block_layout() {
        let catalog = catalog();
        let mut cumulative = CumulativeResult::default();
        cumulative.push(run(3, (4, Some(0.0)), (2, Some(0.0))));
        cumulative.push(run(3, (6, Some(0.5)), (2, None)));
        cumulative.push(run(3, (8, Some(1.0)), (2, Some(0.0))));

        let mut writer = ReportWriter::new(&catalog);
        writer.cumulative_block(3, &cumulative).unwrap();
        let text = writer.finish();

        let expected = concat!(
            "Time per observation = 3\r\n\r\n",
            ",average tally,std tally,average percentage,std percentage,,target percentage\r\n",
            "on task,6.0,2.0,0.5,0.5,,0.75\r\n",
            "off task,2.0,0.0,0.0,0.0,,0.25\r\n",
            "\r\n\r\n",
            "Simulation#,on task tally,on task percentage,off task tally,off task percentage\r\n",
            "1,4,0.0,2,0.0\r\n",
            "2,6,0.5,2,\r\n",
            "3,8,1.0,2,0.0\r\n",
            "\r\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn cumulative_block_needs_two_runs() {
        let catalog = catalog();
        let mut cumulative = CumulativeResult::default();
        cumulative.push(run(1, (1, Some(1.0)), (0, Some(0.0))));
        let mut writer = ReportWriter::new(&catalog);
        assert_eq!(
            writer.cumulative_block(1, &cumulative),
            Err(SimulationError::InsufficientRuns { runs: 1 })
        );
    }
}
