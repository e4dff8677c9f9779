use super::*;

fn sample() -> (Vec<usize>, Vec<usize>) {
    // true, pred
    (vec![0, 1, 2, 0, 1, 2], vec![0, 2, 1, 0, 0, 1])
}

#[test]
fn accuracy_is_bounded_and_exact() {
    let (y_true, y_pred) = sample();
    let acc = accuracy(&y_pred, &y_true);
    assert!((0.0..=1.0).contains(&acc));
    assert!((acc - 2.0 / 6.0).abs() < 1e-6);
}

#[test]
fn perfect_predictions_score_one_everywhere() {
    let y = vec![0, 1, 2, 2, 1, 0];
    for avg in [Average::Macro, Average::Micro, Average::Weighted] {
        assert!((precision(&y, &y, avg) - 1.0).abs() < 1e-6);
        assert!((recall(&y, &y, avg) - 1.0).abs() < 1e-6);
        assert!((f1_score(&y, &y, avg) - 1.0).abs() < 1e-6);
    }
}

#[test]
fn macro_precision_matches_hand_computation() {
    let (y_true, y_pred) = sample();
    // class 0: tp=2 fp=1 -> 2/3 ; class 1: tp=0 fp=2 -> 0 ; class 2: tp=0 fp=1 -> 0
    let p = precision(&y_pred, &y_true, Average::Macro);
    assert!((p - (2.0 / 3.0) / 3.0).abs() < 1e-6);
}

#[test]
fn micro_f1_equals_accuracy_for_single_label() {
    let (y_true, y_pred) = sample();
    let f1 = f1_score(&y_pred, &y_true, Average::Micro);
    assert!((f1 - accuracy(&y_pred, &y_true)).abs() < 1e-6);
}

#[test]
fn weighted_recall_equals_accuracy() {
    let y_true = vec![0, 0, 0, 1, 1, 2];
    let y_pred = vec![0, 1, 0, 1, 2, 2];
    let r = recall(&y_pred, &y_true, Average::Weighted);
    assert!((r - accuracy(&y_pred, &y_true)).abs() < 1e-6);
}

#[test]
fn confusion_matrix_rows_sum_to_support() {
    let (y_true, y_pred) = sample();
    let cm = confusion_matrix(&y_pred, &y_true);
    assert_eq!(cm.shape(), (3, 3));
    assert_eq!(cm.row_sums(), vec![2, 2, 2]);
    assert_eq!(cm.get(0, 0), 2);
    assert_eq!(cm.get(1, 2), 1);
    assert_eq!(cm.get(2, 1), 2);
}

#[test]
#[should_panic(expected = "same length")]
fn mismatched_lengths_panic() {
    let _ = accuracy(&[0, 1], &[0]);
}

#[test]
fn report_names_classes_and_renders() {
    let y_true = vec![0, 0, 1, 1];
    let y_pred = vec![0, 1, 1, 1];
    let labels = vec!["cat".to_string(), "dog".to_string()];
    let report = classification_report(&y_pred, &y_true, &labels);

    assert_eq!(report.classes.len(), 2);
    assert_eq!(report.classes[0].label, "cat");
    assert!((report.classes[0].precision - 1.0).abs() < 1e-6);
    assert!((report.classes[0].recall - 0.5).abs() < 1e-6);
    assert_eq!(report.weighted_avg.support, 4);
    assert!((report.accuracy - 0.75).abs() < 1e-6);

    let text = report.to_string();
    assert!(text.contains("precision"));
    assert!(text.contains("dog"));
    assert!(text.contains("weighted avg"));
}

#[test]
fn report_falls_back_to_index_labels() {
    let report = classification_report(&[0, 1, 2], &[0, 1, 2], &[]);
    assert_eq!(report.classes[2].label, "2");
}

#[test]
fn confusion_matrix_keeps_classes_missing_from_the_split() {
    let cm = confusion_matrix_with_classes(&[0, 1, 1], &[0, 1, 0], 3);
    assert_eq!(cm.shape(), (3, 3));
    assert_eq!(cm.row_sums(), vec![2, 1, 0]);
    assert_eq!(confusion_matrix_with_classes(&[0, 2], &[0, 2], 2).shape(), (3, 3));
}

#[test]
fn report_lists_every_labelled_class() {
    let labels: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let report = classification_report(&[0, 1, 1], &[0, 1, 0], &labels);
    assert_eq!(report.classes.len(), 3);
    assert_eq!(report.classes[2].label, "c");
    assert_eq!(report.classes[2].support, 0);
    assert_eq!(report.weighted_avg.support, 3);
}
