use crate::assertion::matcher::match_subset;
use crate::assertion::types::{Mismatch, Verdict};
use crate::http::Response;
use crate::suite::{Expectation, Payload};

/// 对响应求值 `expect` 块
///
/// 只检查声明过的字段；所有不匹配项都会记录下来。
pub fn evaluate(expect: &Expectation, response: &Response) -> Verdict {
    let mut mismatches = Vec::new();

    if let Some(expected) = expect.status {
        let actual = response.status.code();
        if expected != actual {
            mismatches.push(Mismatch::new("status", expected.to_string(), actual.to_string()));
        }
    }

    for (name, expected) in &expect.headers {
        let field = format!("headers.{}", name.to_ascii_lowercase());
        // 多值 header 中任意一个相等即可
        let actual = response.header_values(name);
        if actual.is_empty() {
            mismatches.push(Mismatch::new(
                field,
                format!("\"{}\"", expected),
                "<missing>",
            ));
        } else if !actual.contains(&expected.as_str()) {
            let shown = actual
                .iter()
                .map(|v| format!("\"{}\"", v))
                .collect::<Vec<_>>()
                .join(", ");
            mismatches.push(Mismatch::new(field, format!("\"{}\"", expected), shown));
        }
    }

    match &expect.body {
        None => {}
        Some(Payload::Text(expected)) => {
            if response.body != *expected {
                mismatches.push(Mismatch::new(
                    "body",
                    format!("\"{}\"", expected),
                    format!("\"{}\"", response.body),
                ));
            }
        }
        Some(Payload::Json(expected)) => match response.json() {
            Some(actual) => match_subset(expected, &actual, "body", &mut mismatches),
            None => mismatches.push(Mismatch::new(
                "body",
                expected.to_string(),
                format!("non-JSON body \"{}\"", response.body),
            )),
        },
    }

    Verdict { mismatches }
}
