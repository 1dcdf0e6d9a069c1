use tracing::warn;

const ASHRAE_WEATHER_FILES: [(&str, &str); 19] = [
    ("1A", "USA_FL_Miami.Intl.AP.722020_TMY3.epw"),
    ("1B", "SAU_Riyadh.404380_IWEC.epw"),
    ("2A", "USA_TX_Houston-Bush.Intercontinental.AP.722430_TMY3.epw"),
    ("2B", "USA_AZ_Phoenix-Sky.Harbor.Intl.AP.722780_TMY3.epw"),
    ("3A", "USA_TN_Memphis.Intl.AP.723340_TMY3.epw"),
    ("3B", "USA_TX_El.Paso.Intl.AP.722700_TMY3.epw"),
    ("3C", "USA_CA_San.Francisco.Intl.AP.724940_TMY3.epw"),
    ("4A", "USA_MD_Baltimore-Washington.Intl.AP.724060_TMY3.epw"),
    ("4B", "USA_NM_Albuquerque.Intl.AP.723650_TMY3.epw"),
    ("4C", "USA_OR_Salem-McNary.Field.726940_TMY3.epw"),
    ("5A", "USA_IL_Chicago-OHare.Intl.AP.725300_TMY3.epw"),
    ("5B", "USA_ID_Boise.Air.Terminal.726810_TMY3.epw"),
    ("5C", "CAN_BC_Vancouver.718920_CWEC.epw"),
    ("6A", "USA_VT_Burlington.Intl.AP.726170_TMY3.epw"),
    ("6B", "USA_MT_Helena.Rgnl.AP.727720_TMY3.epw"),
    ("7A", "USA_MN_Duluth.Intl.AP.727450_TMY3.epw"),
    ("7B", "USA_MN_Duluth.Intl.AP.727450_TMY3.epw"),
    ("8A", "USA_AK_Fairbanks.Intl.AP.702610_TMY3.epw"),
    ("8B", "USA_AK_Fairbanks.Intl.AP.702610_TMY3.epw"),
];

const NECB_ZONES: [&str; 6] = [
    "NECB HDD Method",
    "NECB-CNEB-5",
    "NECB-CNEB-6",
    "NECB-CNEB-7a",
    "NECB-CNEB-7b",
    "NECB-CNEB-8",
];

/// Representative weather file of a climate zone.
///
/// ASHRAE zones are written `"ASHRAE 169-2006-4A"` or `"ASHRAE 169-2013-4A"`.
/// NECB zones have no fixed file and resolve to `necb_epw`. Unknown zones
/// are logged and yield `None`.
pub fn weather_file_for<'a>(climate_zone: &str, necb_epw: Option<&'a str>) -> Option<&'a str> {
    if NECB_ZONES.contains(&climate_zone) {
        if necb_epw.is_none() {
            warn!("Climate zone {climate_zone} needs a weather file to be supplied");
        }
        return necb_epw;
    }
    let zone = climate_zone
        .strip_prefix("ASHRAE 169-2006-")
        .or_else(|| climate_zone.strip_prefix("ASHRAE 169-2013-"));
    let found = zone.and_then(|z| {
        ASHRAE_WEATHER_FILES
            .iter()
            .find(|(k, _)| *k == z)
            .map(|(_, file)| *file)
    });
    if found.is_none() {
        warn!("Could not determine the weather file for climate zone: {climate_zone}");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ashrae_zones() {
        assert_eq!(
            weather_file_for("ASHRAE 169-2006-5A", None),
            Some("USA_IL_Chicago-OHare.Intl.AP.725300_TMY3.epw")
        );
        assert_eq!(
            weather_file_for("ASHRAE 169-2013-5A", None),
            weather_file_for("ASHRAE 169-2006-5A", None)
        );
        assert_eq!(
            weather_file_for("ASHRAE 169-2006-7B", None),
            weather_file_for("ASHRAE 169-2006-7A", None)
        );
    }

    #[test]
    fn test_necb_zones() {
        let epw = "CAN_ON_Toronto.716240_CWEC.epw";
        assert_eq!(weather_file_for("NECB-CNEB-6", Some(epw)), Some(epw));
        assert_eq!(weather_file_for("NECB HDD Method", None), None);
    }

    #[test]
    fn test_unknown_zone() {
        assert_eq!(weather_file_for("ASHRAE 169-2006-9Z", None), None);
        assert_eq!(weather_file_for("CEC T24-CEC1", Some("x.epw")), None);
    }
}
