use rhyme_core::{
    highlight_spans, words_rhyme, HighlightApplier, RhymeConfig, RhymeDetector, RhymeGroups,
    Styling,
};

fn groups_of(text: &str) -> RhymeGroups {
    RhymeDetector::new(RhymeConfig::default())
        .unwrap()
        .find_rhymes(text)
}

fn assert_group(groups: &RhymeGroups, key: &str, words: &[&str]) {
    let found = groups
        .get(key)
        .unwrap_or_else(|| panic!("expected group `{key}`, got {groups:#?}"));
    assert_eq!(found, words, "members of group `{key}`");
}

/// `n` distinct words all ending in `-ing` with different stems.
fn ing_words(n: usize) -> String {
    let stems = [
        "runn", "jump", "sing", "bring", "walk", "talk", "read", "play", "cook", "swimm",
        "think", "dream",
    ];
    stems[..n]
        .iter()
        .map(|s| format!("{s}ing"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn cat_hat_mat() {
    let groups = groups_of("cat hat mat");
    assert_eq!(groups.len(), 1);
    assert_group(&groups, "at", &["cat", "hat", "mat"]);
}

#[test]
fn running_jumping_survives_stop_set() {
    let groups = groups_of("running jumping");
    assert_group(&groups, "ing", &["running", "jumping"]);
}

#[test]
fn stop_set_threshold() {
    assert_eq!(groups_of(&ing_words(8))["ing"].len(), 8);
    assert!(groups_of(&ing_words(9)).get("ing").is_none());
}

#[test]
fn non_stop_set_key_survives_past_threshold() {
    let text = "light night might right sight tight fight bright flight";
    assert_eq!(groups_of(text)["ight"].len(), 9);
}

#[test]
fn oversized_group_is_dropped() {
    let words: Vec<String> = ('b'..='z')
        .filter(|c| !"aeiou".contains(*c))
        .take(16)
        .map(|c| format!("{c}{c}ay"))
        .collect();
    let text = words.join(" ");
    assert!(groups_of(&text).get("ay").is_none());
    let fifteen = words[..15].join(" ");
    assert_eq!(groups_of(&fifteen)["ay"].len(), 15);
}

#[test]
fn every_group_respects_bounds() {
    let text = "The night was bright, the light was right.\n\
                I sat with my cat and my hat on the mat,\n\
                singing and ringing and bringing the string,\n\
                go to the show, you know, row by row.";
    for (key, words) in groups_of(text) {
        assert!(key.len() >= 2, "short key {key}");
        assert!(words.len() >= 2 && words.len() <= 15, "{key}: {words:?}");
        for w in words {
            assert!(w.len() >= 3, "short token {w}");
        }
    }
}

#[test]
fn repeated_words_collapse_for_grouping() {
    let groups = groups_of("Cat cat CAT hat");
    assert_group(&groups, "at", &["cat", "hat"]);
}

#[test]
fn analysis_is_deterministic() {
    let text = "bake cake lake night light fight shout out about stout";
    let first = groups_of(text);
    for _ in 0..5 {
        assert_eq!(groups_of(text), first);
    }
    let keys: Vec<&String> = first.keys().collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let spans_a = highlight_spans(text, &first, 8);
    let spans_b = highlight_spans(text, &groups_of(text), 8);
    assert_eq!(spans_a, spans_b);
}

#[test]
fn highlighting_covers_every_occurrence() {
    let text = "The cat, the Cat, the hat.";
    let detector = RhymeDetector::default();
    let result = detector.analyze(text);
    let mut styling = Styling::default();
    let update = HighlightApplier::new(detector.palette_len())
        .apply(&result, text, &mut styling)
        .expect("fresh result applies");
    let starts: Vec<usize> = update.spans.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![4, 13, 22]);
    // Deduplicated group has two members; the counter does not re-count occurrences.
    assert_eq!(update.stats.rhymes, 2);
    assert_eq!(update.stats.words, 6);
    assert_eq!(update.stats.chars, text.chars().count());
}

#[test]
fn empty_text_yields_nothing() {
    let detector = RhymeDetector::default();
    let result = detector.analyze("");
    assert!(result.groups().is_empty());
    let mut styling = Styling::default();
    let update = HighlightApplier::new(8)
        .apply(&result, "", &mut styling)
        .unwrap();
    assert!(update.spans.is_empty());
    assert_eq!(update.stats.words, 0);
    assert_eq!(update.stats.chars, 0);
    assert_eq!(update.stats.rhymes, 0);
}

#[test]
fn pairwise_examples() {
    assert!(words_rhyme("cat", "hat"));
    assert!(!words_rhyme("cat", "cat"));
    assert!(words_rhyme("light", "right"));
}

#[test]
fn spans_serialize_for_renderers() {
    let groups = groups_of("cat hat");
    let spans = highlight_spans("cat hat", &groups, 8);
    let json = serde_json::to_value(&spans).unwrap();
    assert_eq!(json[1]["start"], 4);
    assert_eq!(json[1]["len"], 3);
    assert_eq!(json[1]["palette_index"], 0);
}
