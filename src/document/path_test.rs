use super::path::FieldPath;

#[test]
fn prefix_matching() {
    let a = FieldPath::from_dotted("a.b");
    let ab_c = FieldPath::from_dotted("a.b.c");
    let ac = FieldPath::from_dotted("a.c");
    assert!(a.is_prefix_of(&ab_c));
    assert!(!a.is_prefix_of(&ac));
    assert!(a.is_prefix_of(&a));
}

#[test]
fn components_split_on_dot() {
    let p = FieldPath::from_dotted("a.b.c");
    assert_eq!(p.components(), &["a".to_string(), "b".to_string(), "c".to_string()]);
}
