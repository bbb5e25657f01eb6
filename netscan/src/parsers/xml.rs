use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use super::{decode, ParseOutput};

/// Fields collected inside one `<host>` block.
#[derive(Default)]
struct HostBlock {
    ip: String,
    mac: String,
    vendor: String,
    hostname: String,
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parse an nmap XML report (`nmap -oX`).
///
/// One record per `<host>`: the first `addrtype="ipv4"` address is the IP,
/// the first `addrtype="mac"` address is the MAC (its `vendor` attribute is
/// kept), the first `<hostname name=...>` is the hostname. A document that
/// turns malformed part-way keeps the hosts read so far.
pub fn parse(raw: &[u8]) -> ParseOutput {
    let text = decode(raw);
    let mut reader = Reader::from_str(&text);
    reader.trim_text(true);

    let mut out = ParseOutput::default();
    let mut current: Option<HostBlock> = None;
    let mut host_index = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"host" => {
                    host_index += 1;
                    current = Some(HostBlock::default());
                }
                b"address" => {
                    let Some(host) = current.as_mut() else { continue };
                    let addr = attr(&e, b"addr").unwrap_or_default();
                    match attr(&e, b"addrtype").as_deref() {
                        Some("ipv4") if host.ip.is_empty() => host.ip = addr,
                        Some("mac") if host.mac.is_empty() => {
                            host.mac = addr;
                            host.vendor = attr(&e, b"vendor").unwrap_or_default();
                        }
                        _ => {}
                    }
                }
                b"hostname" => {
                    if let Some(host) = current.as_mut() {
                        if host.hostname.is_empty() {
                            host.hostname = attr(&e, b"name").unwrap_or_default();
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) if e.name().as_ref() == b"host" => {
                if let Some(host) = current.take() {
                    if host.ip.is_empty() {
                        out.drop_unit(host_index, "host block without IPv4 address");
                    } else {
                        out.push_raw(&host.ip, &host.mac, &host.hostname, &host.vendor, host_index);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(
                    position = reader.buffer_position(),
                    hosts = out.records.len(),
                    "XML report malformed, keeping hosts parsed so far: {e}"
                );
                if current.is_some() {
                    out.drop_unit(host_index, "host block cut short by malformed XML");
                }
                break;
            }
        }
    }

    out
}
