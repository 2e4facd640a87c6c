use usy_reconcile::*;

const FEED: &str = "\
atemmax: +500 +100 +60
loloky: 76
# comment line without separator
hentera: +1000 -50 +250 bonus
: +999
chessmaster:

grandpaw: +1800 oops -0
";

#[test]
fn scenario_balance_feed_sums_and_skips() {
    let set = parse_text(FEED, LineGrammar::Balance);

    let balances: Vec<(&str, i64)> = set
        .entries()
        .iter()
        .map(|e| (e.username.as_str(), e.payload.balance()))
        .collect();

    assert_eq!(
        balances,
        vec![
            ("atemmax", 660),
            ("loloky", 76),
            ("hentera", 1200),
            ("chessmaster", 0),
            ("grandpaw", 1800),
        ]
    );
    // comment line + empty identifier
    assert_eq!(set.skipped, 2);
}

#[test]
fn scenario_signed_sum_property() {
    for (line, expected) in [
        ("u: +10 -3 +2", 9),
        ("u: -10 -10", -20),
        ("u:+7", 7),
        ("u: 0", 0),
        ("u: +10,-3", 7),
        ("u: won 3, lost 1", 4),
        ("u: 5: 10", 5),
    ] {
        let set = parse_text(line, LineGrammar::Balance);
        assert_eq!(set.get("u").unwrap().payload.balance(), expected, "{line}");
    }
}
