//! IP to SI conversions for standards table values.

pub const M_PER_FT: f64 = 0.3048;
pub const M2_PER_FT2: f64 = M_PER_FT * M_PER_FT;
pub const W_PER_BTU_H: f64 = 0.293_071_070_172_222;
pub const M3_S_PER_CFM: f64 = 0.000_471_947_443_2;
/// m²·K/W per h·ft²·°F/Btu.
pub const RSI_PER_RIP: f64 = 0.176_110_2;

pub fn ft_to_m(ft: f64) -> f64 {
    ft * M_PER_FT
}

pub fn ft2_to_m2(ft2: f64) -> f64 {
    ft2 * M2_PER_FT2
}

/// W/ft² to W/m².
pub fn w_per_ft2_to_w_per_m2(v: f64) -> f64 {
    v / M2_PER_FT2
}

/// Btu/h·ft² to W/m².
pub fn btu_h_ft2_to_w_per_m2(v: f64) -> f64 {
    v * W_PER_BTU_H / M2_PER_FT2
}

/// Occupancy in people per 1000 ft² to people/m².
pub fn people_per_1000_ft2_to_people_per_m2(v: f64) -> f64 {
    v / 1000.0 / M2_PER_FT2
}

/// cfm/ft² to m³/s·m².
pub fn cfm_per_ft2_to_m3_s_per_m2(v: f64) -> f64 {
    v * M3_S_PER_CFM / M2_PER_FT2
}

/// cfm/person to m³/s·person.
pub fn cfm_to_m3_s(v: f64) -> f64 {
    v * M3_S_PER_CFM
}

pub fn f_to_c(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn c_to_f(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Thermal resistance h·ft²·°F/Btu to m²·K/W.
pub fn r_ip_to_rsi(r: f64) -> f64 {
    r * RSI_PER_RIP
}
