use std::fs;

use lettre::message::{header::ContentType, Attachment, Body, Message, MultiPart, SinglePart};
use mail_detach::{has_attachment_larger_than, Mode, Notice, Part, RunReport, Rewriter, SizeEstimate};

fn build_message(small: &[u8], large: &[u8]) -> Vec<u8> {
    Message::builder()
        .from("alice@localhost".parse().unwrap())
        .to("bob@localhost".parse().unwrap())
        .subject("quarterly reports")
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(String::from("See the attached reports.")))
                .singlepart(
                    Attachment::new(String::from("small.bin")).body(
                        Body::new(small.to_vec()),
                        ContentType::parse("application/octet-stream").unwrap(),
                    ),
                )
                .singlepart(
                    Attachment::new(String::from("large.bin")).body(
                        Body::new(large.to_vec()),
                        ContentType::parse("application/octet-stream").unwrap(),
                    ),
                ),
        )
        .unwrap()
        .formatted()
}

#[test]
fn test_parse_round_trips_untouched_message() {
    let raw = build_message(b"tiny", &[0x42; 4096]);
    let part = Part::parse(raw.clone()).unwrap();

    assert_eq!(raw, part.to_bytes());
}

#[test]
fn test_rewrite_strips_large_attachment_only() {
    let export = tempfile::tempdir().unwrap();
    let large_payload = vec![0x42; 4096];
    let raw = build_message(b"tiny", &large_payload);

    let part = Part::parse(raw.clone()).unwrap();
    assert!(has_attachment_larger_than(&part, 1024, SizeEstimate::Encoded));

    let rewriter = Rewriter::new(
        Mode::Export,
        1024,
        SizeEstimate::Encoded,
        export.path(),
        "INBOX/Clients/20201231-2359",
    );
    let mut report = RunReport::default();
    let rewritten = rewriter.rewrite(part, &mut report).unwrap();

    assert_eq!(1, report.attachments);

    // sibling count and order are preserved
    let before = Part::parse(raw).unwrap();
    let before_children = before.children().unwrap();
    let children = rewritten.children().unwrap();
    assert_eq!(before_children.len(), children.len());

    // untouched leaves are byte-identical
    assert_eq!(before_children[0].to_bytes(), children[0].to_bytes());
    assert_eq!(before_children[1].to_bytes(), children[1].to_bytes());

    // the stripped leaf carries the parseable notice
    let notice_text = String::from_utf8(children[2].stored_payload().to_vec())
        .unwrap()
        .replace("\r\n", "\n");
    let notice = Notice::parse(&notice_text).unwrap();
    assert_eq!("application/octet-stream", notice.content_type);
    assert_eq!("large.bin", notice.filename);

    // the exported file holds the decoded payload
    let exported = export
        .path()
        .join("INBOX/Clients")
        .join("20201231-2359 large.bin");
    assert_eq!(large_payload, fs::read(exported).unwrap());

    // the rewritten message still parses as a valid part tree
    let reparsed = Part::parse(rewritten.to_bytes()).unwrap();
    assert_eq!(3, reparsed.children().unwrap().len());
}

#[test]
fn test_message_without_attachments_is_untouched() {
    let export = tempfile::tempdir().unwrap();
    let raw = Message::builder()
        .from("alice@localhost".parse().unwrap())
        .to("bob@localhost".parse().unwrap())
        .subject("no attachments here")
        .multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(String::from("Hello!")))
                .singlepart(SinglePart::html(String::from("<p>Hello!</p>"))),
        )
        .unwrap()
        .formatted();

    let part = Part::parse(raw.clone()).unwrap();

    // screening short-circuits before any rewrite
    assert!(!has_attachment_larger_than(&part, 1, SizeEstimate::Encoded));

    // even a forced rewrite leaves the message byte-identical
    let rewriter = Rewriter::new(Mode::Export, 1, SizeEstimate::Encoded, export.path(), "p");
    let mut report = RunReport::default();
    let rewritten = rewriter.rewrite(part, &mut report).unwrap();

    assert_eq!(0, report.attachments);
    assert_eq!(raw, rewritten.to_bytes());
    assert_eq!(0, fs::read_dir(export.path()).unwrap().count());
}

#[test]
fn test_single_part_attachment_message() {
    let export = tempfile::tempdir().unwrap();
    let raw = [
        "Date: Thu, 31 Dec 2020 23:59:00 +0000",
        "From: alice@localhost",
        "To: bob@localhost",
        "Subject: standalone attachment",
        "Content-Type: application/pdf; name=\"report.pdf\"",
        "Content-Disposition: attachment; filename=\"report.pdf\"",
        "Content-Transfer-Encoding: base64",
        "",
        &"QUJDREVGR0hJSktM".repeat(1024),
    ]
    .join("\r\n");

    let part = Part::parse(raw.into_bytes()).unwrap();
    assert!(has_attachment_larger_than(&part, 1024, SizeEstimate::Encoded));

    let rewriter = Rewriter::new(
        Mode::Export,
        1024,
        SizeEstimate::Encoded,
        export.path(),
        "Archive/20201231-2359",
    );
    let mut report = RunReport::default();
    let rewritten = rewriter.rewrite(part, &mut report).unwrap();

    assert_eq!(1, report.attachments);
    assert_eq!("text/plain", rewritten.ctype.mimetype);

    let exported = export
        .path()
        .join("Archive")
        .join("20201231-2359 report.pdf");
    assert_eq!(
        "ABCDEFGHIJKL".repeat(1024).into_bytes(),
        fs::read(exported).unwrap(),
    );

    // the original headers survive on the rewritten message
    let text = String::from_utf8(rewritten.to_bytes()).unwrap();
    assert!(text.contains("Subject: standalone attachment\r\n"));
    assert!(text.contains("From: alice@localhost\r\n"));
    assert!(!text.contains("Content-Transfer-Encoding"));
}
