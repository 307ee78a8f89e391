/*
 * ‌
 * Fedlink Rust SDK
 * ​
 * Copyright (C) 2023 - 2026 Fedlink Labs
 * ​
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 * ‍
 */

use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use crate::Error;

/// A broker address in `host:port` form, normalized for IPv6 hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Hostname, IPv4 address, or (bracket-stripped) IPv6 address.
    pub host: String,

    /// TCP port, never zero.
    pub port: u16,

    /// Whether `host` is an IPv6 address and needs brackets when rendered.
    pub is_v6: bool,
}

impl Address {
    fn parse_port(raw: &str) -> crate::Result<u16> {
        match u16::from_str(raw) {
            Ok(0) | Err(_) => Err(Error::config(format!("invalid port in address: `{raw}`"))),
            Ok(port) => Ok(port),
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // parse route:
        // `[<v6>]:<port>` -> bracketed IPv6.
        // otherwise rsplit_once(':') -> (host, port); a host that still contains
        // `:` must itself be a bare IPv6 address.
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| Error::config(format!("unterminated `[` in address: `{s}`")))?;

            let port = tail
                .strip_prefix(':')
                .ok_or_else(|| Error::config(format!("missing port in address: `{s}`")))
                .and_then(Self::parse_port)?;

            let host = Ipv6Addr::from_str(host)
                .map_err(|_| Error::config(format!("invalid IPv6 host in address: `{s}`")))?;

            return Ok(Self { host: host.to_string(), port, is_v6: true });
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::config(format!("missing port in address: `{s}`")))?;

        let port = Self::parse_port(port)?;

        if host.contains(':') {
            let host = Ipv6Addr::from_str(host)
                .map_err(|_| Error::config(format!("invalid IPv6 host in address: `{s}`")))?;

            return Ok(Self { host: host.to_string(), port, is_v6: true });
        }

        if host.is_empty() {
            return Err(Error::config(format!("missing host in address: `{s}`")));
        }

        Ok(Self { host: host.to_owned(), port, is_v6: false })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_v6 {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use assert_matches::assert_matches;

    use crate::{
        Address,
        Error,
    };

    #[test]
    fn parse_v4() {
        let address = Address::from_str("127.0.0.1:9092").unwrap();

        assert_eq!(address, Address { host: "127.0.0.1".to_owned(), port: 9092, is_v6: false });
        assert_eq!(address.to_string(), "127.0.0.1:9092");
    }

    #[test]
    fn parse_hostname() {
        let address = Address::from_str("broker.example.org:443").unwrap();

        assert_eq!(address.host, "broker.example.org");
        assert_eq!(address.port, 443);
        assert!(!address.is_v6);
    }

    #[test]
    fn parse_v6_bracketed() {
        let address = Address::from_str("[2001:db8::1]:9092").unwrap();

        assert_eq!(address, Address { host: "2001:db8::1".to_owned(), port: 9092, is_v6: true });
        expect_test::expect!["[2001:db8::1]:9092"].assert_eq(&address.to_string());
    }

    #[test]
    fn parse_v6_bare() {
        let address = Address::from_str("::1:9092").unwrap();

        assert_eq!(address, Address { host: "::1".to_owned(), port: 9092, is_v6: true });
        assert_eq!(address.to_string(), "[::1]:9092");
    }

    #[test]
    fn parse_v6_bare_full() {
        let address = Address::from_str("2001:db8::2:9092").unwrap();

        assert_eq!(address.host, "2001:db8::2");
        assert_eq!(address.port, 9092);
        assert!(address.is_v6);
    }

    #[test]
    fn missing_port() {
        assert_matches!(Address::from_str("localhost"), Err(Error::Config(_)));
    }

    #[test]
    fn zero_port() {
        assert_matches!(Address::from_str("localhost:0"), Err(Error::Config(_)));
    }

    #[test]
    fn bad_port() {
        assert_matches!(Address::from_str("localhost:http"), Err(Error::Config(_)));
        assert_matches!(Address::from_str("localhost:70000"), Err(Error::Config(_)));
    }

    #[test]
    fn missing_host() {
        assert_matches!(Address::from_str(":9092"), Err(Error::Config(_)));
    }

    #[test]
    fn unterminated_bracket() {
        assert_matches!(Address::from_str("[2001:db8::1:9092"), Err(Error::Config(_)));
    }
}
