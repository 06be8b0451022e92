use minitmpl::{escape_html, Template};
use proptest::prelude::*;

proptest! {
    #[test]
    fn marker_free_text_renders_verbatim(text in "[^{\\[\\\\]*") {
        let t = Template::parse(&text).unwrap();
        prop_assert_eq!(t.render().unwrap(), text);
    }

    #[test]
    fn values_are_inserted_verbatim(value in "\\PC*") {
        let mut t = Template::parse("<{v}>").unwrap();
        t.set_variable("v", value.clone()).unwrap();
        prop_assert_eq!(t.render().unwrap(), format!("<{}>", value));
    }

    #[test]
    fn sealed_instances_keep_their_snapshot(
        values in prop::collection::vec("[a-z0-9]{0,6}", 0..12),
        later in "[a-z]{1,4}",
    ) {
        let mut t = Template::parse("[beginblock:row]{v};[endblock:row]").unwrap();
        for value in &values {
            t.set_variable("v", value.as_str()).unwrap();
            t.add_block("row").unwrap();
        }
        t.set_variable("v", later).unwrap();

        let expected: String = values.iter().map(|v| format!("{};", v)).collect();
        prop_assert_eq!(t.render().unwrap(), expected);
    }

    #[test]
    fn render_is_repeatable(values in prop::collection::vec("[a-z]{0,4}", 1..6)) {
        let mut t = Template::parse("[beginblock:o][beginblock:i]{v}[endblock:i]|[endblock:o]").unwrap();
        for value in &values {
            t.set_variable("v", value.as_str()).unwrap();
            t.add_block("i").unwrap();
            t.add_block("o").unwrap();
        }
        let first = t.render().unwrap();
        prop_assert_eq!(&first, &t.render().unwrap());
        prop_assert_eq!(&first, &t.clone().render().unwrap());
    }

    #[test]
    fn escaped_values_contain_no_markup(value in "\\PC*") {
        let escaped = escape_html(&value);
        prop_assert!(!escaped.contains(['<', '>', '"', '\'']));
    }
}
