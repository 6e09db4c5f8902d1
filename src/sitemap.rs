use quick_xml::{
    events::Event,
    name::{Namespace, ResolveResult},
    NsReader,
};

use crate::{fetcher::Fetcher, types::WarmError, utils::validate_url};

/// Validates the sitemap url, downloads it and extracts the page urls.
pub fn load_sitemap<F: Fetcher + ?Sized>(
    fetcher: &F,
    sitemap_url: &str,
) -> Result<Vec<String>, WarmError> {
    let url = validate_url(sitemap_url)?;

    debug!("downloading sitemap {}", url);
    let body = fetcher
        .fetch(url.as_str())
        .map_err(|e| e.into_download(sitemap_url))?;
    if body.is_empty() {
        return Err(WarmError::Download {
            url: sitemap_url.into(),
            reason: "empty response".into(),
        });
    }

    let xml = std::str::from_utf8(&body).map_err(|e| WarmError::Parse(e.to_string()))?;
    let urls = parse_sitemap(xml)?;
    info!("sitemap {} lists {} urls", sitemap_url, urls.len());
    Ok(urls)
}

/// Returns the text of every `loc` element living in the sitemap namespace,
/// in document order. The sitemap namespace is the default namespace declared
/// on the root element, or its first prefixed declaration when there is none.
pub fn parse_sitemap(xml: &str) -> Result<Vec<String>, WarmError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut namespace: Option<Vec<u8>> = None;
    let mut depth = 0usize;
    let mut in_loc = false;
    let mut current = String::new();
    let mut urls = Vec::new();

    loop {
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| WarmError::Parse(e.to_string()))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                if namespace.is_none() {
                    // the default namespace wins, otherwise the first prefixed one
                    let declarations: Vec<(bool, Vec<u8>)> = e
                        .attributes()
                        .flatten()
                        .filter_map(|attr| {
                            let key = attr.key.as_ref();
                            if key == b"xmlns" {
                                Some((true, attr.value.into_owned()))
                            } else if key.starts_with(b"xmlns:") {
                                Some((false, attr.value.into_owned()))
                            } else {
                                None
                            }
                        })
                        .filter(|(_, ns)| !ns.is_empty())
                        .collect();
                    let xmlns = declarations
                        .iter()
                        .find(|(default, _)| *default)
                        .or_else(|| declarations.first())
                        .map(|(_, ns)| ns.clone());
                    match xmlns {
                        Some(ns) => namespace = Some(ns),
                        None => {
                            return Err(WarmError::Parse(
                                "the sitemap does not declare a namespace".into(),
                            ))
                        }
                    }
                }

                let is_loc = e.local_name().as_ref() == b"loc"
                    && matches!(
                        (&resolved, namespace.as_deref()),
                        (ResolveResult::Bound(Namespace(ns)), Some(sitemap_ns)) if *ns == sitemap_ns
                    );

                if is_empty {
                    if is_loc {
                        warn!("skipping empty loc entry");
                    }
                } else {
                    depth += 1;
                    if is_loc {
                        in_loc = true;
                        current.clear();
                    }
                }
            }
            Event::Text(ref e) if in_loc => {
                let text = e.unescape().map_err(|e| WarmError::Parse(e.to_string()))?;
                current.push_str(&text);
            }
            Event::CData(ref e) if in_loc => {
                current.push_str(&String::from_utf8_lossy(e));
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                if in_loc && e.local_name().as_ref() == b"loc" {
                    in_loc = false;
                    let url = current.trim();
                    if url.is_empty() {
                        warn!("skipping empty loc entry");
                    } else {
                        urls.push(url.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if namespace.is_none() {
        return Err(WarmError::Parse("no root element found".into()));
    }
    if depth != 0 {
        return Err(WarmError::Parse("unexpected end of document".into()));
    }

    Ok(urls)
}
