//! Laws of the resolver, tagger and aggregator over generated inputs.

use proptest::prelude::*;

use panukb_phewas::aggregate::aggregate;
use panukb_phewas::catalog::{CatalogEntry, PhenotypeCatalog};
use panukb_phewas::domain::{Locus, Phenocode};
use panukb_phewas::error::PhewasError;
use panukb_phewas::table::{ExtractedTable, tag};

fn arb_chrom() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u8..=22).prop_map(|n| n.to_string()),
        Just("X".to_string()),
        Just("chrY".to_string()),
    ]
}

fn arb_field() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.]{1,8}"
}

/// A header width plus `rows` rows of exactly that width.
fn arb_table() -> impl Strategy<Value = (Vec<String>, Vec<Vec<String>>)> {
    (1usize..6).prop_flat_map(|width| {
        (
            prop::collection::vec("[a-z]{1,6}", width),
            prop::collection::vec(prop::collection::vec(arb_field(), width), 0..12),
        )
    })
}

fn to_lines(rows: &[Vec<String>]) -> Vec<String> {
    rows.iter().map(|row| row.join("\t")).collect()
}

proptest! {
    #[test]
    fn resolve_pads_both_bounds(
        chrom in arb_chrom(),
        start in 0i64..250_000_000,
        len in 0i64..1_000_000,
        window in 0i64..1_000_000,
        colon in any::<bool>(),
    ) {
        let end = start + len;
        let sep = if colon { ':' } else { '-' };
        let locus = Locus::resolve(&format!("{chrom}:{start}{sep}{end}"), window).unwrap();
        prop_assert_eq!(&locus.chromosome, &chrom);
        prop_assert_eq!(locus.start, start - window);
        prop_assert_eq!(locus.end, end + window);
        prop_assert!(locus.start <= locus.end);
        prop_assert_eq!(locus.region(), format!("{chrom}:{}-{}", start - window, end + window));
    }

    #[test]
    fn resolve_rejects_single_bound(chrom in arb_chrom(), pos in 0i64..1_000_000) {
        let result = Locus::resolve(&format!("{chrom}:{pos}"), 0);
        prop_assert!(matches!(result, Err(PhewasError::MalformedLocus(_))));
    }

    #[test]
    fn tagging_preserves_rows((header, rows) in arb_table(), code in "[A-Z][0-9]{1,4}") {
        let code: Phenocode = code.parse().unwrap();
        let table = ExtractedTable::from_lines(&code, &header.join("\t"), to_lines(&rows)).unwrap();
        let tagged = tag(table, &code);

        let mut expected_header = vec!["phenocode".to_string()];
        expected_header.extend(header.iter().cloned());
        prop_assert_eq!(tagged.header(), expected_header.as_slice());
        prop_assert_eq!(tagged.row_count(), rows.len());
        for (tagged_row, row) in tagged.rows().iter().zip(&rows) {
            prop_assert_eq!(&tagged_row[0], code.as_str());
            prop_assert_eq!(&tagged_row[1..], row.as_slice());
        }
    }

    #[test]
    fn aggregation_counts_only_catalog_rows(
        tables in prop::collection::vec((arb_table(), 0usize..6), 1..6),
    ) {
        // Catalog holds P0..P2; tables tagged P3..P5 must be dropped.
        let catalog = PhenotypeCatalog::from_entries(
            (0..3)
                .map(|i| {
                    CatalogEntry::new(
                        format!("P{i}").parse().unwrap(),
                        format!("link{i}"),
                        "continuous",
                        format!("desc{i}"),
                    )
                })
                .collect(),
        )
        .unwrap();

        let mut expected = 0;
        let mut tagged = Vec::new();
        for ((header, rows), idx) in &tables {
            let code: Phenocode = format!("P{idx}").parse().unwrap();
            if *idx < 3 {
                expected += rows.len();
            }
            let table =
                ExtractedTable::from_lines(&code, &header.join("\t"), to_lines(rows)).unwrap();
            tagged.push(tag(table, &code));
        }

        let result = aggregate(&tagged, &catalog);
        prop_assert_eq!(result.table.row_count(), expected);
        for row in &result.table.rows {
            prop_assert_eq!(row.len(), result.table.header.len());
            let code: Phenocode = row[0].parse().unwrap();
            prop_assert!(catalog.get(&code).is_some());
        }
    }
}
