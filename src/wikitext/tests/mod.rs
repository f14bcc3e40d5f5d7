use super::*;
use std::time::{Duration, Instant};

#[track_caller]
fn parse(text: &str) -> Vec<Node> {
    let _ = env_logger::try_init();
    Parser::new(["nowiki"]).preprocess_to_obj(text, false).nodes
}

fn text(text: &str) -> Node {
    Node::Text(text.to_string())
}

fn template(name: &str, params: &[(ParamKey, &str)], source: &str) -> Node {
    Node::Template(Template {
        name: name.to_string(),
        params: params
            .iter()
            .map(|(key, value)| (key.clone(), (*value).to_string()))
            .collect(),
        source: source.to_string(),
        line_start: true,
    })
}

fn mid_line(mut node: Node) -> Node {
    if let Node::Template(template) = &mut node {
        template.line_start = false;
    }
    node
}

fn argument(name: &str, default: Option<&str>) -> Node {
    Node::Argument(TemplateArgument {
        name: name.to_string(),
        default: default.map(str::to_string),
    })
}

fn heading(title: Vec<Node>, level: u8, kind: HeadingKind, index: usize) -> Node {
    Node::Heading {
        title,
        level: HeadingLevel::try_from(level).unwrap(),
        kind,
        index,
    }
}

fn named(name: &str) -> ParamKey {
    ParamKey::Named(name.to_string())
}

#[test]
fn plain_text() {
    let source = "Hello [[world|everyone]] | and <b>all</b> = 1";
    assert_eq!(parse(source), [text(source)]);
    assert!(parse("").is_empty());
}

#[test]
fn templates() {
    assert_eq!(
        parse("{{name|k=v}}"),
        [template("Name", &[(named("k"), "v")], "{{name|k=v}}")]
    );

    let source = "a{{ T | x | b = 2 | y }}b";
    assert_eq!(
        parse(source),
        [
            text("a"),
            mid_line(template(
                "T",
                &[
                    (ParamKey::Positional(1), " x "),
                    (named("b"), "2"),
                    (ParamKey::Positional(2), " y "),
                ],
                "{{ T | x | b = 2 | y }}"
            )),
            text("b"),
        ]
    );
}

#[test]
fn numeric_names_stay_named() {
    let nodes = parse("{{T|a|1=b}}");
    let [Node::Template(template)] = nodes.as_slice() else {
        panic!("expected a template, got {nodes:?}");
    };
    assert_eq!(
        template.params.keys().collect::<Vec<_>>(),
        [&ParamKey::Positional(1), &named("1")]
    );
}

#[test]
fn parameter_edge_cases() {
    assert_eq!(parse("{{a|=x}}"), [template("A", &[], "{{a|=x}}")]);
    assert_eq!(
        parse("{{a|[[b|c]]|[[d=e]]}}"),
        [template(
            "A",
            &[
                (ParamKey::Positional(1), "[[b|c]]"),
                (ParamKey::Positional(2), "[[d=e]]"),
            ],
            "{{a|[[b|c]]|[[d=e]]}}"
        )]
    );
    assert_eq!(
        parse("{{a|{{b|c=d}}}}"),
        [template(
            "A",
            &[(ParamKey::Positional(1), "{{b|c=d}}")],
            "{{a|{{b|c=d}}}}"
        )]
    );
}

#[test]
fn arguments() {
    assert_eq!(parse("{{{x}}}"), [argument("x", None)]);
    assert_eq!(parse("{{{x|d}}}"), [argument("x", Some("d"))]);
    assert_eq!(parse("{{{x|}}}"), [argument("x", Some(""))]);
    assert_eq!(parse("{{{x|a|b}}}"), [argument("x", Some("a|b"))]);
    assert_eq!(
        parse("{{{a|{{{b|c}}}}}}"),
        [argument("a", Some("{{{b|c}}}"))]
    );
}

#[test]
fn as_argument() {
    let parser = Parser::default();
    assert_eq!(
        parser.parse_fragment("{{{a|b}}}").as_argument(),
        Some(&TemplateArgument {
            name: "a".into(),
            default: Some("b".into()),
        })
    );
    assert_eq!(parser.parse_fragment("x{{{a}}}").as_argument(), None);
    assert!(parser.parse_fragment("").is_empty());
}

#[test]
fn unterminated() {
    assert_eq!(parse("{{a"), [text("{{a")]);
    assert_eq!(parse("{{{a|b"), [text("{{{a|b")]);
    assert_eq!(parse("a}}b"), [text("a}}b")]);
    assert_eq!(
        parse("{{a|{{b}}"),
        [text("{{a|"), mid_line(template("B", &[], "{{b}}"))]
    );
}

#[test]
fn mismatched_braces() {
    assert_eq!(parse("{{a}}}"), [template("A", &[], "{{a}}"), text("}")]);
    assert_eq!(
        parse("{{{x}}"),
        [text("{"), mid_line(template("X", &[], "{{x}}"))]
    );
    assert_eq!(
        parse("{{{{{x}}}}}"),
        [template("{{{x}}}", &[], "{{{{{x}}}}}")]
    );
}

#[test]
fn pathological_braces() {
    let source = "{".repeat(10_000);
    assert_eq!(parse(&source), [text(&source)]);

    let source = "}".repeat(10_000);
    assert_eq!(parse(&source), [text(&source)]);
}

#[track_caller]
fn assert_parses_quickly(source: &str) -> Vec<Node> {
    let start = Instant::now();
    let nodes = parse(source);
    let elapsed = start.elapsed();
    assert!(
        elapsed < Duration::from_secs(2),
        "parsing {} bytes took {elapsed:?}",
        source.len()
    );
    nodes
}

#[test]
fn unterminated_openers_are_linear() {
    let source = "{{a|".repeat(50_000);
    assert_eq!(assert_parses_quickly(&source), [text(&source)]);

    let source = "{{{a|{{b|".repeat(25_000);
    assert_eq!(assert_parses_quickly(&source), [text(&source)]);

    // Each heading line looks for constructs to skip over
    let source = "\n== {{a ==".repeat(25_000);
    let nodes = assert_parses_quickly(&source);
    assert_eq!(nodes.len(), 50_000);
    assert!(matches!(nodes.last(), Some(Node::Heading { index: 25_000, .. })));
}

#[test]
fn headings() {
    use HeadingKind::{EqualsSign, HtmlTag};

    assert_eq!(
        parse("== A ==\ntext"),
        [heading(vec![text(" A ")], 2, EqualsSign, 1), text("\ntext")]
    );
    assert_eq!(
        parse("=== A ==  \n"),
        [heading(vec![text("= A ")], 2, EqualsSign, 1), text("\n")]
    );
    assert_eq!(
        parse("=====\n"),
        [heading(vec![text("=")], 2, EqualsSign, 1), text("\n")]
    );
    assert_eq!(parse("=="), [text("==")]);
    assert_eq!(parse("x == A =="), [text("x == A ==")]);
    assert_eq!(parse("== A == x"), [text("== A == x")]);

    assert_eq!(
        parse("= a =\n== {{b}} ==\n<h3>c</h3>"),
        [
            heading(vec![text(" a ")], 1, EqualsSign, 1),
            text("\n"),
            heading(
                vec![text(" "), mid_line(template("B", &[], "{{b}}")), text(" ")],
                2,
                EqualsSign,
                2
            ),
            text("\n"),
            heading(vec![text("c")], 3, HtmlTag(Attributes::new()), 3),
        ]
    );

    let nodes = parse("<h2 class=\"x\" onclick=\"y\">T</h2>");
    let [Node::Heading {
        kind: HtmlTag(attributes),
        ..
    }] = nodes.as_slice()
    else {
        panic!("expected a heading, got {nodes:?}");
    };
    assert_eq!(attributes.get("class").map(String::as_str), Some("x"));
    assert_eq!(attributes.get("onclick").map(String::as_str), Some("y"));
}

#[test]
fn headings_in_parameters() {
    assert_eq!(
        parse("{{T|\n== A ==\n|b}}"),
        [template(
            "T",
            &[
                (ParamKey::Positional(1), "\n== A ==\n"),
                (ParamKey::Positional(2), "b"),
            ],
            "{{T|\n== A ==\n|b}}"
        )]
    );

    // Pipes and `=` inside the heading line belong to the heading
    assert_eq!(
        parse("{{T|\n== a=b | c ==\n|d}}"),
        [template(
            "T",
            &[
                (ParamKey::Positional(1), "\n== a=b | c ==\n"),
                (ParamKey::Positional(2), "d"),
            ],
            "{{T|\n== a=b | c ==\n|d}}"
        )]
    );

    // A separator before the heading line still names the parameter
    assert_eq!(
        parse("{{T|k=\n== A ==\n}}"),
        [template("T", &[(named("k"), "== A ==")], "{{T|k=\n== A ==\n}}")]
    );

    // An unclosed line is not a heading
    assert_eq!(
        parse("{{T|x\n=y}}"),
        [template("T", &[(named("x"), "y")], "{{T|x\n=y}}")]
    );
}

#[test]
fn template_line_start() {
    assert_eq!(
        parse("{{a}}\n{{b}} {{c}}"),
        [
            template("A", &[], "{{a}}"),
            text("\n"),
            template("B", &[], "{{b}}"),
            text(" "),
            mid_line(template("C", &[], "{{c}}")),
        ]
    );

    // Fragments continue a line of their containing document
    assert_eq!(
        Parser::default().parse_fragment("{{a}}\n{{b}}").nodes,
        [
            mid_line(template("A", &[], "{{a}}")),
            text("\n"),
            template("B", &[], "{{b}}"),
        ]
    );
}

#[test]
fn extension_tags() {
    let nodes = parse("a<NoWiki class=x>{{b}}</nowiki>c<nowiki/>");
    let [
        Node::Text(before),
        Node::Extension(tag),
        Node::Text(after),
        Node::Extension(empty),
    ] = nodes.as_slice()
    else {
        panic!("unexpected nodes: {nodes:?}");
    };
    assert_eq!(before, "a");
    assert_eq!(tag.name, "nowiki");
    assert_eq!(tag.attributes.get("class").map(String::as_str), Some("x"));
    assert!(!tag.self_closing);
    assert_eq!(tag.content, "{{b}}");
    assert_eq!(after, "c");
    assert!(empty.self_closing);
    assert!(empty.content.is_empty());

    // Unregistered tags are text
    assert_eq!(
        Parser::default().parse_fragment("<nowiki>{{b}}</nowiki>").nodes,
        [
            text("<nowiki>"),
            mid_line(template("B", &[], "{{b}}")),
            text("</nowiki>")
        ]
    );

    // Tag bodies are opaque to template matching
    assert_eq!(
        parse("{{a|<nowiki>}}</nowiki>}}"),
        [template(
            "A",
            &[(ParamKey::Positional(1), "<nowiki>}}</nowiki>")],
            "{{a|<nowiki>}}</nowiki>}}"
        )]
    );
}

#[test]
fn inclusion() {
    let parser = Parser::default();
    let source = "<noinclude>a</noinclude><includeonly>b</includeonly>c<!-- {{d}} -->";
    assert_eq!(parser.preprocess_to_obj(source, false).nodes, [text("ac")]);
    assert_eq!(parser.preprocess_to_obj(source, true).nodes, [text("bc")]);
}
