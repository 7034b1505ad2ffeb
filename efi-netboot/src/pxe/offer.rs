// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offer classification, caching and selection.
//!
//! Every offer received during one DHCP exchange is classified into an
//! [`OfferType`] and appended to an [`OfferCache`]. Once the exchange asks
//! for a choice, the cache picks one offer either in arrival order or by
//! walking a ranked table of [`SelectRule`]s.

use alloc::vec::Vec;

/// Classification of a DHCP offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OfferType {
    /// Plain DHCP offer with an address and no PXE information.
    DhcpOnly,
    /// Offer with an address and PXE boot server discovery options.
    DhcpPxe10,
    /// Offer with an address and PXE MTFTP options.
    DhcpWfm11a,
    /// Offer with an address from a PXE server that only names itself.
    DhcpBinl,
    /// Proxy offer with PXE boot server discovery options.
    ProxyPxe10,
    /// Proxy offer with PXE MTFTP options.
    ProxyWfm11a,
    /// Proxy offer that only names a PXE server.
    ProxyBinl,
    /// BOOTP reply.
    Bootp,
}

impl OfferType {
    /// Number of offer types.
    pub const COUNT: usize = 8;

    /// True for the offers that carry no client address.
    #[must_use]
    pub const fn is_proxy(self) -> bool {
        matches!(self, Self::ProxyPxe10 | Self::ProxyWfm11a | Self::ProxyBinl)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// What the cache needs to know about an offer.
pub trait CachedOffer {
    /// Classification of the offer.
    fn offer_type(&self) -> OfferType;

    /// True if the offer assigns no client address.
    fn is_proxy(&self) -> bool;

    /// True if the offer names a boot file.
    fn has_boot_file(&self) -> bool;
}

/// One step of the ranked selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectRule {
    /// The first offer of this type.
    First(OfferType),
    /// The first `base` offer, provided a `proxy` offer was cached too.
    WithProxy {
        /// Type of the selected offer.
        base: OfferType,
        /// Type of the proxy offer completing it.
        proxy: OfferType,
    },
    /// The first offer of this type that names a boot file.
    FirstWithBootFile(OfferType),
}

/// Selection ranking of DHCPv4 offers, best first.
pub const DHCP4_SELECT_RULES: [SelectRule; 8] = [
    SelectRule::First(OfferType::DhcpPxe10),
    SelectRule::First(OfferType::DhcpWfm11a),
    SelectRule::WithProxy {
        base: OfferType::DhcpOnly,
        proxy: OfferType::ProxyPxe10,
    },
    SelectRule::WithProxy {
        base: OfferType::DhcpOnly,
        proxy: OfferType::ProxyWfm11a,
    },
    SelectRule::First(OfferType::DhcpBinl),
    SelectRule::WithProxy {
        base: OfferType::DhcpOnly,
        proxy: OfferType::ProxyBinl,
    },
    SelectRule::FirstWithBootFile(OfferType::DhcpOnly),
    SelectRule::FirstWithBootFile(OfferType::Bootp),
];

/// Selection ranking of DHCPv6 offers. DHCPv6 has no BOOTP.
pub const DHCP6_SELECT_RULES: [SelectRule; 7] = [
    DHCP4_SELECT_RULES[0],
    DHCP4_SELECT_RULES[1],
    DHCP4_SELECT_RULES[2],
    DHCP4_SELECT_RULES[3],
    DHCP4_SELECT_RULES[4],
    DHCP4_SELECT_RULES[5],
    DHCP4_SELECT_RULES[6],
];

/// The chosen offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Index of the offer in arrival order.
    pub index: usize,
    /// Proxy type completing a [`OfferType::DhcpOnly`] offer, when the
    /// selecting rule named one.
    pub proxy_type: Option<OfferType>,
}

/// Offers received during one DHCP exchange, in arrival order.
#[derive(Clone, Debug)]
pub struct OfferCache<T> {
    offers: Vec<T>,
    by_type: [Vec<usize>; OfferType::COUNT],
    proxy_received: bool,
    selection: Option<Selection>,
}

impl<T> Default for OfferCache<T> {
    fn default() -> Self {
        Self {
            offers: Vec::new(),
            by_type: Default::default(),
            proxy_received: false,
            selection: None,
        }
    }
}

impl<T: CachedOffer> OfferCache<T> {
    /// Most offers kept per exchange.
    pub const MAX_OFFERS: usize = 16;

    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every offer and the selection.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True once [`Self::MAX_OFFERS`] offers are cached.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.offers.len() >= Self::MAX_OFFERS
    }

    /// Number of cached offers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    /// True if no offer is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    /// True if any proxy offer arrived, cached or not.
    #[must_use]
    pub const fn proxy_received(&self) -> bool {
        self.proxy_received
    }

    /// Offer at `index` in arrival order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.offers.get(index)
    }

    /// Every cached offer, in arrival order.
    #[must_use]
    pub fn offers(&self) -> &[T] {
        &self.offers
    }

    /// Arrival indices of the cached offers of `offer_type`.
    #[must_use]
    pub fn indices(&self, offer_type: OfferType) -> &[usize] {
        &self.by_type[offer_type.index()]
    }

    /// Number of cached offers of `offer_type`.
    #[must_use]
    pub fn count(&self, offer_type: OfferType) -> usize {
        self.indices(offer_type).len()
    }

    /// Result of the last [`Self::select`].
    #[must_use]
    pub const fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Caches `offer` unless the cache is full or the offer is redundant.
    ///
    /// Only the first BOOTP reply and the first proxy offer of each non-BINL
    /// type are kept. Every proxy BINL offer and every offer carrying an
    /// address is kept. Returns whether the offer was cached.
    pub fn insert(&mut self, offer: T) -> bool {
        if self.is_full() {
            return false;
        }
        let offer_type = offer.offer_type();
        let index = self.offers.len();
        let list = &mut self.by_type[offer_type.index()];

        if offer_type == OfferType::Bootp {
            if !list.is_empty() {
                return false;
            }
        } else if offer.is_proxy() {
            self.proxy_received = true;
            let keep = match offer_type {
                OfferType::ProxyBinl => true,
                OfferType::ProxyPxe10 | OfferType::ProxyWfm11a => list.is_empty(),
                _ => false,
            };
            if !keep {
                return false;
            }
        }

        list.push(index);
        self.offers.push(offer);
        true
    }

    /// Chooses one offer and remembers the choice.
    ///
    /// With `sorted` the first matching rule of `rules` wins. Otherwise the
    /// first offer in arrival order that carries an address is taken,
    /// skipping plain DHCP offers without a boot file when no proxy offer
    /// arrived to complete them.
    pub fn select(&mut self, rules: &[SelectRule], sorted: bool) -> Option<Selection> {
        self.selection = if sorted {
            rules.iter().find_map(|rule| self.apply(*rule))
        } else {
            self.offers
                .iter()
                .position(|offer| {
                    !offer.is_proxy()
                        && (self.proxy_received
                            || offer.offer_type() != OfferType::DhcpOnly
                            || offer.has_boot_file())
                })
                .map(|index| Selection {
                    index,
                    proxy_type: None,
                })
        };
        self.selection
    }

    fn apply(&self, rule: SelectRule) -> Option<Selection> {
        match rule {
            SelectRule::First(offer_type) => self.indices(offer_type).first().map(|&index| Selection {
                index,
                proxy_type: None,
            }),
            SelectRule::WithProxy { base, proxy } => {
                if self.count(proxy) == 0 {
                    return None;
                }
                self.indices(base).first().map(|&index| Selection {
                    index,
                    proxy_type: Some(proxy),
                })
            }
            SelectRule::FirstWithBootFile(offer_type) => self
                .indices(offer_type)
                .iter()
                .copied()
                .find(|&i| self.offers[i].has_boot_file())
                .map(|index| Selection {
                    index,
                    proxy_type: None,
                }),
        }
    }

    /// Proxy offers to try, in order, for a selected plain DHCP offer.
    ///
    /// A sorted selection names the proxy type to use; every cached offer of
    /// that type is a candidate. Otherwise every cached proxy offer is, in
    /// arrival order.
    #[must_use]
    pub fn proxy_candidates(&self, sorted: bool) -> Vec<usize> {
        match (sorted, self.selection.and_then(|s| s.proxy_type)) {
            (true, Some(proxy)) => self.indices(proxy).to_vec(),
            (true, None) => Vec::new(),
            (false, _) => (0..self.offers.len()).filter(|&i| self.offers[i].is_proxy()).collect(),
        }
    }
}
