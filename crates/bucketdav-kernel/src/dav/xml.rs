//! `DAV:` multistatus rendering.

use chrono::{DateTime, Utc};
use percent_encoding::utf8_percent_encode;
use std::fmt::Write;
use std::time::SystemTime;

use super::headers::PATH_ENCODE_SET;
use super::propfind::{PropEntry, ResourceKind};

/// RFC 1123 date, as `getlastmodified` wants it.
pub fn http_date(time: SystemTime) -> String {
    let time: DateTime<Utc> = time.into();
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Render entries as a 207 body. Hrefs are prefixed with `base_path`.
pub fn multistatus(entries: &[PropEntry], base_path: &str) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<D:multistatus xmlns:D=\"DAV:\">\n");
    for entry in entries {
        let href = format!("{}{}", base_path, entry.href);
        let href = utf8_percent_encode(&href, PATH_ENCODE_SET).to_string();

        // Writing into a String cannot fail.
        let _ = writeln!(
            xml,
            "<D:response><D:href>{}</D:href><D:propstat><D:prop>",
            escape(&href)
        );
        let name = escape(&entry.display_name());
        let _ = writeln!(xml, "<D:displayname>{name}</D:displayname>");
        match entry.kind {
            ResourceKind::Collection => {
                xml.push_str("<D:resourcetype><D:collection/></D:resourcetype>\n");
            }
            ResourceKind::File => {
                xml.push_str("<D:resourcetype/>\n");
                let size = entry.size;
                let _ = writeln!(xml, "<D:getcontentlength>{size}</D:getcontentlength>");
            }
        }
        if let Some(modified) = entry.last_modified {
            let modified = http_date(modified);
            let _ = writeln!(xml, "<D:getlastmodified>{modified}</D:getlastmodified>");
        }
        if let Some(content_type) = &entry.content_type {
            let content_type = escape(content_type);
            let _ = writeln!(xml, "<D:getcontenttype>{content_type}</D:getcontenttype>");
        }
        xml.push_str("</D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response>\n");
    }
    xml.push_str("</D:multistatus>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_http_date() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_multistatus_escapes() {
        let entries = vec![
            PropEntry::collection("/media/a&b/", None),
            PropEntry {
                href: "/media/a&b/my file.txt".to_string(),
                kind: ResourceKind::File,
                size: 5,
                last_modified: Some(SystemTime::UNIX_EPOCH),
                content_type: Some("text/plain".to_string()),
            },
        ];
        let xml = multistatus(&entries, "/dav");
        assert!(xml.contains("<D:href>/dav/media/a&amp;b/</D:href>"));
        assert!(xml.contains("<D:href>/dav/media/a&amp;b/my%20file.txt</D:href>"));
        assert!(xml.contains("<D:collection/>"));
        assert!(xml.contains("<D:getcontentlength>5</D:getcontentlength>"));
        assert!(xml.contains("<D:displayname>my file.txt</D:displayname>"));
        assert!(xml.contains("Thu, 01 Jan 1970 00:00:00 GMT"));
        assert_eq!(xml.matches("<D:response>").count(), 2);
    }
}
